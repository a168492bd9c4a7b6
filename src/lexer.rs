//! A module implementing lexical analysis (tokenization) of one pipeline stage.

use crate::error::ShellError;

/// A single argument produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// The argument text with quote characters removed.
    pub text: String,
    /// Whether any part of the word came from inside quotes.
    pub quoted: bool,
}

impl Word {
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    /// Between words.
    Start,
    ReadingWord,
    /// Inside a quote opened with the given character.
    ReadingQuote(char),
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    max_words: usize,
    buffer: String,
    quoted: bool,
}

impl<'a> LexingFSM<'a> {
    fn new(segment: &'a str, max_words: usize) -> Self {
        LexingFSM {
            input: segment.chars(),
            state: LexingState::Start,
            max_words,
            buffer: String::new(),
            quoted: false,
        }
    }

    /// Runs the machine over the whole segment.
    ///
    /// Stops early, without error, once `max_words` words have been produced.
    /// Any words built so far are dropped if the segment ends inside a quote.
    fn make_words(&mut self) -> Result<Vec<Word>, ShellError> {
        let mut out = Vec::new();

        while out.len() < self.max_words {
            let Some(ch) = self.input.next() else {
                break;
            };
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingQuote(quote) => self.handle_quote(ch, quote, &mut out),
            }
        }

        match self.state {
            LexingState::ReadingQuote(_) => Err(ShellError::UnclosedQuote),
            LexingState::ReadingWord if out.len() < self.max_words => {
                self.finish_word(&mut out);
                Ok(out)
            }
            _ => Ok(out),
        }
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            c if c.is_whitespace() => {}
            '"' | '\'' => self.open_quote(ch),
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Word>) {
        match ch {
            c if c.is_whitespace() => self.finish_word(out),
            '"' | '\'' => self.open_quote(ch),
            c => self.buffer.push(c),
        }
    }

    fn handle_quote(&mut self, ch: char, quote: char, out: &mut Vec<Word>) {
        if ch == quote {
            // A closing quote always ends the word, even if text follows directly.
            self.finish_word(out);
        } else {
            self.buffer.push(ch);
        }
    }

    fn open_quote(&mut self, quote: char) {
        self.quoted = true;
        self.state = LexingState::ReadingQuote(quote);
    }

    fn finish_word(&mut self, out: &mut Vec<Word>) {
        out.push(Word {
            text: std::mem::take(&mut self.buffer),
            quoted: std::mem::take(&mut self.quoted),
        });
        self.state = LexingState::Start;
    }
}

/// Split one command segment into words, keeping track of quoting.
///
/// See [`tokenize`] for the splitting rules.
pub fn split_words(segment: &str, max_words: usize) -> Result<Vec<Word>, ShellError> {
    LexingFSM::new(segment, max_words).make_words()
}

/// Split one command segment into its argument strings.
///
/// Words are separated by runs of whitespace. A `"` or `'` outside quotes
/// opens a quote that runs to the next identical character; its contents are
/// taken literally and the quote characters are dropped. The closing quote
/// ends the current token.
///
/// At most `max_tokens` tokens are returned; the rest of the segment is
/// ignored. A segment ending inside a quote yields
/// [`ShellError::UnclosedQuote`] and no tokens at all.
pub fn tokenize(segment: &str, max_tokens: usize) -> Result<Vec<String>, ShellError> {
    Ok(split_words(segment, max_tokens)?
        .into_iter()
        .map(|w| w.text)
        .collect())
}
