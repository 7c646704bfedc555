//! Lexical analysis of one shell line.

/// A part of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Unquoted text.
    Literal(String),
    /// Text that came from single or double quotes.
    Quoted(String),
    /// Parameter substitution, `$NAME` or `${NAME}`. Holds the variable name.
    Param(String),
}

/// A token of a shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word, possibly glued together from quoted and unquoted parts.
    Word(Vec<WordPart>),
    /// One of `|`, `;`, `&`, `<`, `>`.
    Operator(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote,
    /// A closing brace for `${...}` was not found.
    UnfinishedParamSubst,
    /// The line ends with a lone backslash.
    TrailingEscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
    Comment,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
    tokens: Vec<Token>,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
            tokens: Vec::new(),
        }
    }

    fn make_tokens(mut self) -> Result<Vec<Token>, LexingError> {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch)?,
                LexingState::ReadingWord => self.handle_word(ch)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
                LexingState::Comment => break,
            }
        }

        if matches!(
            self.state,
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote
        ) {
            return Err(LexingError::UnfinishedQuote);
        }

        self.finish_word();
        Ok(self.tokens)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\r' => Ok(()),
            '#' => {
                self.state = LexingState::Comment;
                Ok(())
            }
            c => {
                self.state = LexingState::ReadingWord;
                self.handle_word(c)
            }
        }
    }

    fn handle_word(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\r' => {
                self.finish_word();
                self.state = LexingState::Start;
            }
            '|' | ';' | '&' | '<' | '>' => {
                self.finish_word();
                self.tokens.push(Token::Operator(ch));
                self.state = LexingState::Start;
            }
            '\'' => {
                self.flush_literal();
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.flush_literal();
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => match self.read_char() {
                Some(escaped) => self.buffer.push(escaped),
                None => return Err(LexingError::TrailingEscape),
            },
            '$' => match self.read_param()? {
                Some(name) => {
                    self.flush_literal();
                    self.current_word.push(WordPart::Param(name));
                }
                None => self.buffer.push('$'),
            },
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.close_quote(),
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.close_quote(),
            '\\' => match self.read_char() {
                Some(c @ ('"' | '\\' | '$')) => self.buffer.push(c),
                Some(c) => {
                    self.buffer.push('\\');
                    self.buffer.push(c);
                }
                None => return Err(LexingError::UnfinishedQuote),
            },
            '$' => match self.read_param()? {
                Some(name) => {
                    if !self.buffer.is_empty() {
                        self.current_word
                            .push(WordPart::Quoted(std::mem::take(&mut self.buffer)));
                    }
                    self.current_word.push(WordPart::Param(name));
                }
                None => self.buffer.push('$'),
            },
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// `""` and `"$EMPTY"` still have to produce a word, so a quoted part is
    /// pushed even when empty.
    fn close_quote(&mut self) {
        let has_quoted = self
            .current_word
            .iter()
            .any(|part| matches!(part, WordPart::Quoted(_)));
        if !self.buffer.is_empty() || !has_quoted {
            self.current_word
                .push(WordPart::Quoted(std::mem::take(&mut self.buffer)));
        }
        self.state = LexingState::ReadingWord;
    }

    /// Reads a parameter name after `$`. `None` when no valid name follows, in
    /// which case the `$` is literal.
    fn read_param(&mut self) -> Result<Option<String>, LexingError> {
        if self.peek_char() == Some('{') {
            self.read_char();
            let mut name = String::new();
            while let Some(ch) = self.read_char() {
                if ch == '}' {
                    return Ok(Some(name));
                }
                name.push(ch);
            }
            return Err(LexingError::UnfinishedParamSubst);
        }

        match self.peek_char() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return Ok(None),
        }
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            name.push(c);
            self.read_char();
        }
        Ok(Some(name))
    }

    fn flush_literal(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    fn finish_word(&mut self) {
        self.flush_literal();
        if !self.current_word.is_empty() {
            self.tokens
                .push(Token::Word(std::mem::take(&mut self.current_word)));
        }
    }
}

/// Split `line` into tokens. Everything after an unquoted `#` that starts a word
/// is a comment.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line).make_tokens()
}
