pub const IF: &str = "if";
pub const OR: &str = "or";
pub const AND: &str = "and";
pub const LET: &str = "let";
pub const ELSE: &str = "else";
pub const ARROW: &str = "=>";
pub const COND: &str = "cond";
pub const CASE: &str = "case";
pub const QUOTE: &str = "quote";
pub const BEGIN: &str = "begin";
pub const DEFINE: &str = "define";
pub const LAMBDA: &str = "lambda";
pub const SET_BANG: &str = "set!";
pub const UNQUOTE: &str = "unquote";
pub const INCLUDE: &str = "include";
pub const INCLUDE_CI: &str = "include-ci";
pub const QUASIQUOTE: &str = "quasiquote";
pub const SYNTAX_RULES: &str = "syntax-rules";
pub const DEFINE_SYNTAX: &str = "define-syntax";
pub const UNQUOTE_SPLICING: &str = "unquote-splicing";
