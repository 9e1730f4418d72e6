#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Eof,
    Newline,
    Indent,
    Dedent,

    Ident,
    Int,
    Float,
    Str,

    // keywords
    And,
    As,
    Assert,
    Async,
    Await,
    Break,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    False,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    In,
    Is,
    Lambda,
    None_,
    Nonlocal,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    True,
    Try,
    While,
    With,
    Yield,

    // punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    ColonEq,
    Semi,
    Dot,
    Ellipsis,
    Arrow,

    // operators
    Plus,
    Minus,
    Star,
    Slash,
    FloorDiv,
    Percent,
    Pow,
    At,
    Amp,
    Pipe,
    Caret,
    Tilde,
    LShift,
    RShift,
    Eq,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,

    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    FloorDivEq,
    PercentEq,
    PowEq,
    AtEq,
    AmpEq,
    PipeEq,
    CaretEq,
    LShiftEq,
    RShiftEq,
}

impl Kind {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::EqEq
                | Self::NotEq
                | Self::Lt
                | Self::LtE
                | Self::Gt
                | Self::GtE
                | Self::In
                | Self::Is
                | Self::Not // lookahead-composed "not in"
        )
    }
}

pub fn keyword_kind(text: &str) -> Option<Kind> {
    Some(match text {
        "and" => Kind::And,
        "as" => Kind::As,
        "assert" => Kind::Assert,
        "async" => Kind::Async,
        "await" => Kind::Await,
        "break" => Kind::Break,
        "class" => Kind::Class,
        "continue" => Kind::Continue,
        "def" => Kind::Def,
        "del" => Kind::Del,
        "elif" => Kind::Elif,
        "else" => Kind::Else,
        "except" => Kind::Except,
        "False" => Kind::False,
        "finally" => Kind::Finally,
        "for" => Kind::For,
        "from" => Kind::From,
        "global" => Kind::Global,
        "if" => Kind::If,
        "import" => Kind::Import,
        "in" => Kind::In,
        "is" => Kind::Is,
        "lambda" => Kind::Lambda,
        "None" => Kind::None_,
        "nonlocal" => Kind::Nonlocal,
        "not" => Kind::Not,
        "or" => Kind::Or,
        "pass" => Kind::Pass,
        "raise" => Kind::Raise,
        "return" => Kind::Return,
        "True" => Kind::True,
        "try" => Kind::Try,
        "while" => Kind::While,
        "with" => Kind::With,
        "yield" => Kind::Yield,
        _ => return None,
    })
}
