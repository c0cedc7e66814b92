use std::rc::Rc;

/// Shared string, used for symbol names, string payloads and environment
/// keys. Two symbols with the same name are indistinguishable, so content
/// equality is all we need.
pub type ImmutableString = Rc<str>;

macro_rules! check {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
