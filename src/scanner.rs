//! The scanner: characters in, tokens out.
//!
//! The first token is always [`TokenData::StreamStart`] and the last one
//! [`TokenData::StreamEnd`]. Tokens come out in source order even when a
//! later `:` retroactively proves that an earlier scalar was a mapping key;
//! the KEY (and, in block context, BLOCK-MAPPING-START) tokens are then
//! inserted at the queue slot saved with the candidate.

use std::collections::VecDeque;

use crate::cursor::{CharClass, CharCursor};
use crate::{Encoding, Mark, ScalarStyle, ScannerError, Token, TokenData};

/// A spot where a simple key may retroactively begin.
///
/// The candidate expires when the line ends or the value indicator falls
/// more than 1024 bytes behind; a mandatory candidate (one sitting exactly
/// at the block indent) that expires is an error.
#[derive(Copy, Clone, Default)]
struct KeyCandidate {
    live: bool,
    mandatory: bool,
    /// Queue slot where the KEY token would be inserted.
    queue_slot: usize,
    mark: Mark,
}

/// Whitespace folding between content runs of a plain or quoted scalar.
///
/// Blanks with no break fold to themselves. Once a break arrives the blanks
/// are dropped: a single plain newline folds to one space, additional
/// breaks are kept verbatim, and a break consumed by a `\` escape
/// contributes nothing at all.
#[derive(Default)]
struct LineJoin {
    spaces: String,
    kind: BreakKind,
    extras: String,
}

#[derive(Default, PartialEq)]
enum BreakKind {
    #[default]
    None,
    /// A plain newline, subject to folding.
    Folded,
    /// A Unicode line or paragraph separator, preserved as-is.
    Literal(char),
    /// A break removed by a `\` escape.
    Escaped,
}

impl LineJoin {
    fn has_break(&self) -> bool {
        self.kind != BreakKind::None
    }

    fn keep_space(&mut self, ch: char) {
        self.spaces.push(ch);
    }

    fn keep_break(&mut self, ch: char) {
        if self.kind == BreakKind::None {
            self.spaces.clear();
            self.kind = if ch == '\n' {
                BreakKind::Folded
            } else {
                BreakKind::Literal(ch)
            };
        } else {
            self.extras.push(ch);
        }
    }

    fn escaped_break(&mut self) {
        if self.kind == BreakKind::None {
            self.spaces.clear();
            self.kind = BreakKind::Escaped;
        }
    }

    fn flush_into(&mut self, out: &mut String) {
        match std::mem::take(&mut self.kind) {
            BreakKind::None => out.push_str(&self.spaces),
            BreakKind::Folded => {
                if self.extras.is_empty() {
                    out.push(' ');
                } else {
                    out.push_str(&self.extras);
                }
            }
            BreakKind::Literal(first) => {
                out.push(first);
                out.push_str(&self.extras);
            }
            BreakKind::Escaped => out.push_str(&self.extras),
        }
        self.spaces.clear();
        self.extras.clear();
    }
}

/// Chomping mode of a block scalar header.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Chomping {
    Clip,
    Strip,
    Keep,
}

fn is_word_char(ch: Option<char>) -> bool {
    ch.is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

/// The scanner turns a byte stream into a token stream.
#[non_exhaustive]
pub struct Scanner<'r> {
    cursor: CharCursor<'r>,
    /// Tokens produced but not yet handed out.
    queue: VecDeque<Token>,
    /// Number of tokens already handed out; queue slots are counted from
    /// the start of the stream, so slot minus this is a queue index.
    emitted: usize,
    /// Whether the queue head has been vetted against pending candidates.
    head_ready: bool,
    started: bool,
    finished: bool,
    /// Depth of unclosed `[` and `{`.
    flow_depth: i32,
    /// The current block indentation column; `-1` at stream scope.
    indent: i64,
    indent_stack: Vec<i64>,
    /// May a simple key start at the current position?
    key_allowed: bool,
    /// One candidate record per flow level.
    key_candidates: Vec<KeyCandidate>,
}

impl<'r> Default for Scanner<'r> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Scanner<'r> {
    /// Create a scanner.
    pub fn new() -> Scanner<'r> {
        Scanner {
            cursor: CharCursor::new(),
            queue: VecDeque::with_capacity(16),
            emitted: 0,
            head_ready: false,
            started: false,
            finished: false,
            flow_depth: 0,
            indent: 0,
            indent_stack: Vec::with_capacity(16),
            key_allowed: false,
            key_candidates: Vec::with_capacity(16),
        }
    }

    /// Reset the scanner state.
    pub fn reset(&mut self) {
        *self = Scanner::new();
    }

    /// Set a string input.
    pub fn set_input_string(&mut self, input: &'r mut &[u8]) {
        self.cursor.set_source(input);
    }

    /// Set a generic input handler.
    pub fn set_input(&mut self, input: &'r mut dyn std::io::BufRead) {
        self.cursor.set_source(input);
    }

    /// Set the source encoding, overriding detection.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.cursor.set_encoding(encoding);
    }

    /// Scan the input stream and produce the next token.
    ///
    /// Call the function subsequently to produce a sequence of tokens
    /// corresponding to the input stream. After the STREAM-END token has
    /// been produced, every further call returns STREAM-END again.
    pub fn scan(&mut self) -> Result<Token, ScannerError> {
        if self.finished {
            return Ok(Token {
                data: TokenData::StreamEnd,
                start_mark: self.cursor.mark,
                end_mark: self.cursor.mark,
            });
        }
        if !self.head_ready {
            self.ensure_token()?;
        }
        let token = self.queue.pop_front().expect("token queue is empty");
        self.head_ready = false;
        self.emitted += 1;
        if matches!(token.data, TokenData::StreamEnd) {
            self.finished = true;
        }
        Ok(token)
    }

    /// Whether the STREAM-END token has been handed out.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// The token at the queue head, producing more as needed.
    pub(crate) fn head(&mut self) -> Result<&Token, ScannerError> {
        if !self.head_ready {
            self.ensure_token()?;
        }
        Ok(self.queue.front().expect("token queue is empty"))
    }

    /// The token at the queue head, mutably.
    pub(crate) fn head_mut(&mut self) -> Result<&mut Token, ScannerError> {
        if !self.head_ready {
            self.ensure_token()?;
        }
        Ok(self.queue.front_mut().expect("token queue is empty"))
    }

    /// Drop the token at the queue head.
    pub(crate) fn pop_head(&mut self) {
        let token = self.queue.pop_front().expect("token queue is empty");
        self.head_ready = false;
        self.emitted += 1;
        if matches!(token.data, TokenData::StreamEnd) {
            self.finished = true;
        }
    }

    /// Produce tokens until the head is settled: present, and no live key
    /// candidate could still insert a KEY token in front of it.
    fn ensure_token(&mut self) -> Result<(), ScannerError> {
        loop {
            if !self.queue.is_empty() {
                self.expire_key_candidates()?;
                let head_contested = self
                    .key_candidates
                    .iter()
                    .any(|candidate| candidate.live && candidate.queue_slot == self.emitted);
                if !head_contested {
                    break;
                }
            }
            self.produce_next()?;
        }
        self.head_ready = true;
        Ok(())
    }

    fn error<T>(
        &self,
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
    ) -> Result<T, ScannerError> {
        Err(ScannerError::Problem {
            context,
            context_mark,
            problem,
            problem_mark: self.cursor.mark,
        })
    }

    fn push_token(&mut self, data: TokenData, start: Mark) {
        self.queue.push_back(Token {
            data,
            start_mark: start,
            end_mark: self.cursor.mark,
        });
    }

    fn push_token_here(&mut self, data: TokenData) {
        let mark = self.cursor.mark;
        self.queue.push_back(Token {
            data,
            start_mark: mark,
            end_mark: mark,
        });
    }

    /// Whether `---` or `...` (with `marker` being `-` or `.`) sits at the
    /// start of the current line.
    fn at_document_indicator(&self, marker: char) -> bool {
        self.cursor.mark.column == 0
            && self.cursor.is_at(0, marker)
            && self.cursor.is_at(1, marker)
            && self.cursor.is_at(2, marker)
            && self.cursor.at_blankz_at(3)
    }

    fn at_any_document_indicator(&self) -> bool {
        self.at_document_indicator('-') || self.at_document_indicator('.')
    }

    /// The decision procedure: skip separation, settle indentation, then
    /// dispatch on the character under the cursor.
    fn produce_next(&mut self) -> Result<(), ScannerError> {
        self.cursor.require(1)?;
        if !self.started {
            self.open_stream();
            return Ok(());
        }
        self.skip_to_token_start()?;
        self.expire_key_candidates()?;
        self.close_indents_to(self.cursor.mark.column as i64);
        self.cursor.require(4)?;

        let Some(ch) = self.cursor.peek() else {
            return self.close_stream();
        };
        if self.cursor.mark.column == 0 {
            if ch == '%' {
                return self.take_directive();
            }
            if self.at_document_indicator('-') {
                return self.take_document_marker(TokenData::DocumentStart);
            }
            if self.at_document_indicator('.') {
                return self.take_document_marker(TokenData::DocumentEnd);
            }
        }
        match ch {
            '[' => return self.begin_flow_collection(TokenData::FlowSequenceStart),
            '{' => return self.begin_flow_collection(TokenData::FlowMappingStart),
            ']' => return self.end_flow_collection(TokenData::FlowSequenceEnd),
            '}' => return self.end_flow_collection(TokenData::FlowMappingEnd),
            ',' => return self.take_flow_entry(),
            '*' => return self.take_anchor_or_alias(true),
            '&' => return self.take_anchor_or_alias(false),
            '!' => return self.take_tag(),
            '\'' => return self.take_quoted_scalar(true),
            '"' => return self.take_quoted_scalar(false),
            '|' if self.flow_depth == 0 => return self.take_block_scalar(false),
            '>' if self.flow_depth == 0 => return self.take_block_scalar(true),
            '-' if self.cursor.at_blankz_at(1) => return self.take_block_entry(),
            '?' if self.flow_depth > 0 || self.cursor.at_blankz_at(1) => {
                return self.take_explicit_key();
            }
            ':' if self.flow_depth > 0 || self.cursor.at_blankz_at(1) => {
                return self.take_value();
            }
            _ => {}
        }
        if self.plain_scalar_can_start(ch) {
            return self.take_plain_scalar();
        }
        self.error(
            "while scanning for the next token",
            self.cursor.mark,
            "found character that cannot start any token",
        )
    }

    fn plain_scalar_can_start(&self, ch: char) -> bool {
        let indicator = matches!(
            ch,
            '-' | '?'
                | ':'
                | ','
                | '['
                | ']'
                | '{'
                | '}'
                | '#'
                | '&'
                | '*'
                | '!'
                | '|'
                | '>'
                | '\''
                | '"'
                | '%'
                | '@'
                | '`'
        );
        if !indicator && !self.cursor.at_blankz() {
            return true;
        }
        if ch == '-' && !self.cursor.at_blank_at(1) {
            return true;
        }
        self.flow_depth == 0 && matches!(ch, '?' | ':') && !self.cursor.at_blankz_at(1)
    }

    /// Skip separation: BOM at line start, spaces (tabs too where a simple
    /// key cannot start), comments, and line breaks.
    fn skip_to_token_start(&mut self) -> Result<(), ScannerError> {
        loop {
            self.cursor.require(1)?;
            if self.cursor.mark.column == 0 && self.cursor.is('\u{feff}') {
                self.cursor.eat();
                self.cursor.require(1)?;
            }
            let tabs_ok = self.flow_depth > 0 || !self.key_allowed;
            while self.cursor.is(' ') || (tabs_ok && self.cursor.is('\t')) {
                self.cursor.eat();
                self.cursor.require(1)?;
            }
            if self.cursor.is('#') {
                while matches!(self.cursor.class(), CharClass::Printable | CharClass::Blank) {
                    self.cursor.eat();
                    self.cursor.require(1)?;
                }
            }
            if self.cursor.class() != CharClass::Break {
                return Ok(());
            }
            self.cursor.require(2)?;
            self.cursor.eat_line_break();
            if self.flow_depth == 0 {
                self.key_allowed = true;
            }
        }
    }

    /// Kill candidates that a line break or the 1024-byte window has put
    /// out of reach.
    fn expire_key_candidates(&mut self) -> Result<(), ScannerError> {
        let current = self.cursor.mark;
        for candidate in &mut self.key_candidates {
            if !candidate.live {
                continue;
            }
            let out_of_reach = candidate.mark.line < current.line
                || candidate.mark.index + 1024 < current.index;
            if !out_of_reach {
                continue;
            }
            if candidate.mandatory {
                return Err(ScannerError::Problem {
                    context: "while scanning a simple key",
                    context_mark: candidate.mark,
                    problem: "could not find expected ':'",
                    problem_mark: current,
                });
            }
            candidate.live = false;
        }
        Ok(())
    }

    /// Record that a simple key could start right here.
    fn note_key_candidate(&mut self) -> Result<(), ScannerError> {
        if !self.key_allowed {
            return Ok(());
        }
        let candidate = KeyCandidate {
            live: true,
            mandatory: self.flow_depth == 0 && self.indent == self.cursor.mark.column as i64,
            queue_slot: self.emitted + self.queue.len(),
            mark: self.cursor.mark,
        };
        self.discard_key_candidate()?;
        *self
            .key_candidates
            .last_mut()
            .expect("candidate stack is never empty") = candidate;
        Ok(())
    }

    fn discard_key_candidate(&mut self) -> Result<(), ScannerError> {
        let current = self.cursor.mark;
        let candidate = self
            .key_candidates
            .last_mut()
            .expect("candidate stack is never empty");
        if candidate.live && candidate.mandatory {
            return Err(ScannerError::Problem {
                context: "while scanning a simple key",
                context_mark: candidate.mark,
                problem: "could not find expected ':'",
                problem_mark: current,
            });
        }
        candidate.live = false;
        Ok(())
    }

    /// Open a block collection at `column` when it is deeper than the
    /// current level. `retrofit` is the saved queue slot for the simple-key
    /// case; without it the start token goes to the back of the queue.
    fn open_indent(&mut self, column: i64, retrofit: Option<usize>, data: TokenData, mark: Mark) {
        if self.flow_depth > 0 || column <= self.indent {
            return;
        }
        self.indent_stack
            .push(std::mem::replace(&mut self.indent, column));
        let token = Token {
            data,
            start_mark: mark,
            end_mark: mark,
        };
        match retrofit {
            Some(slot) => self.queue.insert(slot - self.emitted, token),
            None => self.queue.push_back(token),
        }
    }

    /// Emit BLOCK-END for every indentation level deeper than `column`. The
    /// stack bottoms out at the `-1` stream-scope sentinel.
    fn close_indents_to(&mut self, column: i64) {
        if self.flow_depth > 0 {
            return;
        }
        while self.indent > column {
            self.indent = self.indent_stack.pop().expect("indent stack underflow");
            self.push_token_here(TokenData::BlockEnd);
        }
    }

    fn open_stream(&mut self) {
        self.indent = -1;
        self.key_candidates.push(KeyCandidate::default());
        self.key_allowed = true;
        self.started = true;
        self.push_token_here(TokenData::StreamStart {
            encoding: self.cursor.encoding,
        });
    }

    fn close_stream(&mut self) -> Result<(), ScannerError> {
        if self.cursor.mark.column != 0 {
            self.cursor.mark.column = 0;
            self.cursor.mark.line += 1;
        }
        self.close_indents_to(-1);
        self.discard_key_candidate()?;
        self.key_allowed = false;
        self.push_token_here(TokenData::StreamEnd);
        Ok(())
    }

    fn take_document_marker(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.close_indents_to(-1);
        self.discard_key_candidate()?;
        self.key_allowed = false;
        let start = self.cursor.mark;
        for _ in 0..3 {
            self.cursor.eat();
        }
        self.push_token(data, start);
        Ok(())
    }

    fn begin_flow_collection(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.note_key_candidate()?;
        self.key_candidates.push(KeyCandidate::default());
        assert!(self.flow_depth < i32::MAX, "flow depth overflow");
        self.flow_depth += 1;
        self.key_allowed = true;
        let start = self.cursor.mark;
        self.cursor.eat();
        self.push_token(data, start);
        Ok(())
    }

    fn end_flow_collection(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.discard_key_candidate()?;
        if self.flow_depth > 0 {
            self.flow_depth -= 1;
            self.key_candidates.pop();
        }
        self.key_allowed = false;
        let start = self.cursor.mark;
        self.cursor.eat();
        self.push_token(data, start);
        Ok(())
    }

    fn take_flow_entry(&mut self) -> Result<(), ScannerError> {
        self.discard_key_candidate()?;
        self.key_allowed = true;
        let start = self.cursor.mark;
        self.cursor.eat();
        self.push_token(TokenData::FlowEntry, start);
        Ok(())
    }

    fn take_block_entry(&mut self) -> Result<(), ScannerError> {
        if self.flow_depth == 0 {
            if !self.key_allowed {
                return self.error(
                    "",
                    self.cursor.mark,
                    "block sequence entries are not allowed in this context",
                );
            }
            self.open_indent(
                self.cursor.mark.column as i64,
                None,
                TokenData::BlockSequenceStart,
                self.cursor.mark,
            );
        }
        self.discard_key_candidate()?;
        self.key_allowed = true;
        let start = self.cursor.mark;
        self.cursor.eat();
        self.push_token(TokenData::BlockEntry, start);
        Ok(())
    }

    fn take_explicit_key(&mut self) -> Result<(), ScannerError> {
        if self.flow_depth == 0 {
            if !self.key_allowed {
                return self.error(
                    "",
                    self.cursor.mark,
                    "mapping keys are not allowed in this context",
                );
            }
            self.open_indent(
                self.cursor.mark.column as i64,
                None,
                TokenData::BlockMappingStart,
                self.cursor.mark,
            );
        }
        self.discard_key_candidate()?;
        self.key_allowed = self.flow_depth == 0;
        let start = self.cursor.mark;
        self.cursor.eat();
        self.push_token(TokenData::Key, start);
        Ok(())
    }

    fn take_value(&mut self) -> Result<(), ScannerError> {
        let candidate = *self
            .key_candidates
            .last()
            .expect("candidate stack is never empty");
        if candidate.live {
            // Retrofit the KEY (and the mapping start) at the saved slot so
            // the consumer sees KEY, <scalar>, VALUE in source order.
            self.key_candidates
                .last_mut()
                .expect("candidate stack is never empty")
                .live = false;
            let key = Token {
                data: TokenData::Key,
                start_mark: candidate.mark,
                end_mark: candidate.mark,
            };
            self.queue
                .insert(candidate.queue_slot - self.emitted, key);
            self.open_indent(
                candidate.mark.column as i64,
                Some(candidate.queue_slot),
                TokenData::BlockMappingStart,
                candidate.mark,
            );
            self.key_allowed = false;
        } else {
            if self.flow_depth == 0 {
                if !self.key_allowed {
                    return self.error(
                        "",
                        self.cursor.mark,
                        "mapping values are not allowed in this context",
                    );
                }
                self.open_indent(
                    self.cursor.mark.column as i64,
                    None,
                    TokenData::BlockMappingStart,
                    self.cursor.mark,
                );
            }
            self.key_allowed = self.flow_depth == 0;
        }
        let start = self.cursor.mark;
        self.cursor.eat();
        self.push_token(TokenData::Value, start);
        Ok(())
    }

    fn take_anchor_or_alias(&mut self, alias: bool) -> Result<(), ScannerError> {
        self.note_key_candidate()?;
        self.key_allowed = false;
        let start = self.cursor.mark;
        self.cursor.eat();
        let mut name = String::new();
        self.cursor.require(1)?;
        while is_word_char(self.cursor.peek()) {
            name.push(self.cursor.eat());
            self.cursor.require(1)?;
        }
        let valid_follower = self.cursor.at_blankz()
            || matches!(
                self.cursor.peek(),
                Some('?' | ':' | ',' | ']' | '}' | '%' | '@' | '`')
            );
        if name.is_empty() || !valid_follower {
            return self.error(
                if alias {
                    "while scanning an alias"
                } else {
                    "while scanning an anchor"
                },
                start,
                "did not find expected alphabetic or numeric character",
            );
        }
        let data = if alias {
            TokenData::Alias { value: name }
        } else {
            TokenData::Anchor { value: name }
        };
        self.push_token(data, start);
        Ok(())
    }

    fn take_directive(&mut self) -> Result<(), ScannerError> {
        self.close_indents_to(-1);
        self.discard_key_candidate()?;
        self.key_allowed = false;
        let start = self.cursor.mark;
        self.cursor.eat();
        let name = self.read_directive_name(start)?;
        let data = match name.as_str() {
            "YAML" => {
                let (major, minor) = self.read_version_pair(start)?;
                TokenData::VersionDirective { major, minor }
            }
            "TAG" => {
                let (handle, prefix) = self.read_tag_directive(start)?;
                TokenData::TagDirective { handle, prefix }
            }
            _ => {
                return self.error(
                    "while scanning a directive",
                    start,
                    "found unknown directive name",
                );
            }
        };
        let end = self.cursor.mark;
        self.skip_directive_trailer(start)?;
        self.queue.push_back(Token {
            data,
            start_mark: start,
            end_mark: end,
        });
        Ok(())
    }

    fn read_directive_name(&mut self, start: Mark) -> Result<String, ScannerError> {
        let mut name = String::new();
        self.cursor.require(1)?;
        while is_word_char(self.cursor.peek()) {
            name.push(self.cursor.eat());
            self.cursor.require(1)?;
        }
        if name.is_empty() {
            return self.error(
                "while scanning a directive",
                start,
                "could not find expected directive name",
            );
        }
        if !self.cursor.at_blankz() {
            return self.error(
                "while scanning a directive",
                start,
                "found unexpected non-alphabetical character",
            );
        }
        Ok(name)
    }

    fn read_version_pair(&mut self, start: Mark) -> Result<(i32, i32), ScannerError> {
        self.cursor.require(1)?;
        while self.cursor.at_blank() {
            self.cursor.eat();
            self.cursor.require(1)?;
        }
        let major = self.read_version_number(start)?;
        if !self.cursor.is('.') {
            return self.error(
                "while scanning a %YAML directive",
                start,
                "did not find expected digit or '.' character",
            );
        }
        self.cursor.eat();
        let minor = self.read_version_number(start)?;
        Ok((major, minor))
    }

    fn read_version_number(&mut self, start: Mark) -> Result<i32, ScannerError> {
        let mut number: i32 = 0;
        let mut digits = 0;
        self.cursor.require(1)?;
        while let Some(digit) = self.cursor.digit() {
            digits += 1;
            if digits > 9 {
                return self.error(
                    "while scanning a %YAML directive",
                    start,
                    "found extremely long version number",
                );
            }
            number = number * 10 + digit as i32;
            self.cursor.eat();
            self.cursor.require(1)?;
        }
        if digits == 0 {
            return self.error(
                "while scanning a %YAML directive",
                start,
                "did not find expected version number",
            );
        }
        Ok(number)
    }

    fn read_tag_directive(&mut self, start: Mark) -> Result<(String, String), ScannerError> {
        self.cursor.require(1)?;
        while self.cursor.at_blank() {
            self.cursor.eat();
            self.cursor.require(1)?;
        }
        let handle = self.read_tag_handle(true, start)?;
        self.cursor.require(1)?;
        if !self.cursor.at_blank() {
            return self.error(
                "while scanning a %TAG directive",
                start,
                "did not find expected whitespace",
            );
        }
        while self.cursor.at_blank() {
            self.cursor.eat();
            self.cursor.require(1)?;
        }
        let prefix = self.read_tag_uri(true, true, None, start)?;
        self.cursor.require(1)?;
        if !self.cursor.at_blankz() {
            return self.error(
                "while scanning a %TAG directive",
                start,
                "did not find expected whitespace or line break",
            );
        }
        Ok((handle, prefix))
    }

    /// Everything after a directive's value: blanks, an optional comment,
    /// then a line break or the end of input.
    fn skip_directive_trailer(&mut self, start: Mark) -> Result<(), ScannerError> {
        self.cursor.require(1)?;
        while self.cursor.at_blank() {
            self.cursor.eat();
            self.cursor.require(1)?;
        }
        if self.cursor.is('#') {
            while matches!(self.cursor.class(), CharClass::Printable | CharClass::Blank) {
                self.cursor.eat();
                self.cursor.require(1)?;
            }
        }
        match self.cursor.class() {
            CharClass::Break => {
                self.cursor.require(2)?;
                self.cursor.eat_line_break();
                Ok(())
            }
            CharClass::End => Ok(()),
            _ => self.error(
                "while scanning a directive",
                start,
                "did not find expected comment or line break",
            ),
        }
    }

    fn take_tag(&mut self) -> Result<(), ScannerError> {
        self.note_key_candidate()?;
        self.key_allowed = false;
        let start = self.cursor.mark;
        self.cursor.require(2)?;

        let handle;
        let suffix;
        if self.cursor.is_at(1, '<') {
            // The !<uri> form: empty handle, verbatim suffix.
            self.cursor.eat();
            self.cursor.eat();
            handle = String::new();
            suffix = self.read_tag_uri(true, false, None, start)?;
            if !self.cursor.is('>') {
                return self.error(
                    "while scanning a tag",
                    start,
                    "did not find the expected '>'",
                );
            }
            self.cursor.eat();
        } else {
            let scanned = self.read_tag_handle(false, start)?;
            if scanned.len() > 1 && scanned.starts_with('!') && scanned.ends_with('!') {
                handle = scanned;
                suffix = self.read_tag_uri(false, false, None, start)?;
            } else {
                // The handle was really the start of the suffix; a bare `!`
                // stands alone as the non-specific tag.
                let rest = self.read_tag_uri(false, false, Some(&scanned), start)?;
                if rest.is_empty() {
                    handle = String::new();
                    suffix = String::from("!");
                } else {
                    handle = String::from("!");
                    suffix = rest;
                }
            }
        }

        self.cursor.require(1)?;
        if !self.cursor.at_blankz() && (self.flow_depth == 0 || !self.cursor.is(',')) {
            return self.error(
                "while scanning a tag",
                start,
                "did not find expected whitespace or line break",
            );
        }
        self.push_token(TokenData::Tag { handle, suffix }, start);
        Ok(())
    }

    fn read_tag_handle(&mut self, directive: bool, start: Mark) -> Result<String, ScannerError> {
        let context = if directive {
            "while scanning a tag directive"
        } else {
            "while scanning a tag"
        };
        self.cursor.require(1)?;
        if !self.cursor.is('!') {
            return self.error(context, start, "did not find expected '!'");
        }
        let mut handle = String::from(self.cursor.eat());
        self.cursor.require(1)?;
        while is_word_char(self.cursor.peek()) {
            handle.push(self.cursor.eat());
            self.cursor.require(1)?;
        }
        if self.cursor.is('!') {
            handle.push(self.cursor.eat());
        } else if directive && handle != "!" {
            // A %TAG handle must be closed: !, !! or !name!.
            return self.error(context, start, "did not find expected '!'");
        }
        Ok(handle)
    }

    /// Scan a tag URI. `extended` additionally admits the flow indicators
    /// `,`, `[` and `]` (the verbatim and directive-prefix positions).
    fn read_tag_uri(
        &mut self,
        extended: bool,
        directive: bool,
        seed: Option<&str>,
        start: Mark,
    ) -> Result<String, ScannerError> {
        let context = if directive {
            "while parsing a %TAG directive"
        } else {
            "while parsing a tag"
        };
        let seed = seed.unwrap_or("");
        let mut consumed = seed.len();
        // A seed comes from the handle scanner; drop its leading '!'.
        let mut uri = String::from(seed.strip_prefix('!').unwrap_or(seed));
        loop {
            self.cursor.require(1)?;
            let Some(ch) = self.cursor.peek() else { break };
            let allowed = is_word_char(Some(ch))
                || ";/?:@&=+$.%!~*'()".contains(ch)
                || (extended && ",[]".contains(ch));
            if !allowed {
                break;
            }
            if ch == '%' {
                let decoded = self.read_uri_escape(context, start)?;
                uri.push(decoded);
            } else {
                uri.push(self.cursor.eat());
            }
            consumed += 1;
        }
        if consumed == 0 {
            return self.error(context, start, "did not find expected tag URI");
        }
        Ok(uri)
    }

    /// Decode a `%HH` escape run into one character. The first octet sets
    /// the UTF-8 sequence length; the rest must be continuation octets.
    fn read_uri_escape(
        &mut self,
        context: &'static str,
        start: Mark,
    ) -> Result<char, ScannerError> {
        let mut bytes: Vec<u8> = Vec::with_capacity(4);
        let mut expected = 1;
        while bytes.len() < expected {
            self.cursor.require(3)?;
            let (Some(high), Some(low)) = (self.cursor.hex_at(1), self.cursor.hex_at(2)) else {
                return self.error(context, start, "did not find URI escaped octet");
            };
            if !self.cursor.is('%') {
                return self.error(context, start, "did not find URI escaped octet");
            }
            let octet = (high << 4 | low) as u8;
            if bytes.is_empty() {
                expected = match octet {
                    0x00..=0x7F => 1,
                    0xC0..=0xDF => 2,
                    0xE0..=0xEF => 3,
                    0xF0..=0xF7 => 4,
                    _ => {
                        return self.error(
                            context,
                            start,
                            "found an incorrect leading UTF-8 octet",
                        );
                    }
                };
            } else if octet & 0xC0 != 0x80 {
                return self.error(context, start, "found an incorrect trailing UTF-8 octet");
            }
            bytes.push(octet);
            for _ in 0..3 {
                self.cursor.eat();
            }
        }
        match std::str::from_utf8(&bytes).ok().and_then(|text| text.chars().next()) {
            Some(ch) => Ok(ch),
            None => self.error(context, start, "found an incorrect UTF-8 octet sequence"),
        }
    }

    fn take_block_scalar(&mut self, folded: bool) -> Result<(), ScannerError> {
        self.discard_key_candidate()?;
        self.key_allowed = true;
        let token = self.scan_block(folded)?;
        self.queue.push_back(token);
        Ok(())
    }

    fn take_quoted_scalar(&mut self, single: bool) -> Result<(), ScannerError> {
        self.note_key_candidate()?;
        self.key_allowed = false;
        let token = self.scan_quoted(single)?;
        self.queue.push_back(token);
        Ok(())
    }

    fn take_plain_scalar(&mut self) -> Result<(), ScannerError> {
        self.note_key_candidate()?;
        self.key_allowed = false;
        let token = self.scan_plain()?;
        self.queue.push_back(token);
        Ok(())
    }

    /// The header after `|` or `>`: an optional chomping indicator and an
    /// optional indentation digit, in either order. A digit of 0 is
    /// rejected.
    fn read_block_header(&mut self, start: Mark) -> Result<(Chomping, Option<i64>), ScannerError> {
        let mut chomping = Chomping::Clip;
        let mut indent = None;
        self.cursor.require(1)?;
        for _ in 0..2 {
            match self.cursor.peek() {
                Some('+') if chomping == Chomping::Clip => {
                    chomping = Chomping::Keep;
                    self.cursor.eat();
                }
                Some('-') if chomping == Chomping::Clip => {
                    chomping = Chomping::Strip;
                    self.cursor.eat();
                }
                Some('0') if indent.is_none() => {
                    return self.error(
                        "while scanning a block scalar",
                        start,
                        "found an indentation indicator equal to 0",
                    );
                }
                Some(digit @ '1'..='9') if indent.is_none() => {
                    indent = Some(digit.to_digit(10).expect("ascii digit") as i64);
                    self.cursor.eat();
                }
                _ => break,
            }
            self.cursor.require(1)?;
        }
        Ok((chomping, indent))
    }

    fn skip_block_header_trailer(&mut self, start: Mark) -> Result<(), ScannerError> {
        self.cursor.require(1)?;
        while self.cursor.at_blank() {
            self.cursor.eat();
            self.cursor.require(1)?;
        }
        if self.cursor.is('#') {
            while matches!(self.cursor.class(), CharClass::Printable | CharClass::Blank) {
                self.cursor.eat();
                self.cursor.require(1)?;
            }
        }
        match self.cursor.class() {
            CharClass::Break => {
                self.cursor.require(2)?;
                self.cursor.eat_line_break();
                Ok(())
            }
            CharClass::End => Ok(()),
            _ => self.error(
                "while scanning a block scalar",
                start,
                "did not find expected comment or line break",
            ),
        }
    }

    /// Skip indentation and collect blank-line breaks into `run`. With no
    /// explicit indentation indicator, the content level becomes the widest
    /// leading-space count seen, at least `parent + 1` and at least 1.
    fn gather_block_breaks(
        &mut self,
        content_indent: &mut i64,
        run: &mut String,
        scalar_start: Mark,
    ) -> Result<Mark, ScannerError> {
        let mut widest: i64 = 0;
        let mut end = self.cursor.mark;
        loop {
            self.cursor.require(1)?;
            while (*content_indent == 0 || (self.cursor.mark.column as i64) < *content_indent)
                && self.cursor.is(' ')
            {
                self.cursor.eat();
                self.cursor.require(1)?;
            }
            widest = widest.max(self.cursor.mark.column as i64);
            if (*content_indent == 0 || (self.cursor.mark.column as i64) < *content_indent)
                && self.cursor.is('\t')
            {
                return self.error(
                    "while scanning a block scalar",
                    scalar_start,
                    "found a tab character where an indentation space is expected",
                );
            }
            if !self.cursor.at_break() {
                break;
            }
            self.cursor.require(2)?;
            if let Some(br) = self.cursor.eat_line_break() {
                run.push(br);
            }
            end = self.cursor.mark;
        }
        if *content_indent == 0 {
            *content_indent = widest.max(self.indent + 1).max(1);
        }
        Ok(end)
    }

    fn scan_block(&mut self, folded: bool) -> Result<Token, ScannerError> {
        let start = self.cursor.mark;
        self.cursor.eat();
        let (chomping, explicit_indent) = self.read_block_header(start)?;
        self.skip_block_header_trailer(start)?;

        let mut content_indent: i64 = match explicit_indent {
            Some(extra) if self.indent >= 0 => self.indent + extra,
            Some(extra) => extra,
            None => 0,
        };

        let mut text = String::new();
        // Breaks not yet committed to the text: the break that ended the
        // previous content line first, then any blank-line breaks.
        let mut run = String::new();
        let mut after_content = false;
        let mut prev_line_blank = false;
        let mut end = self.gather_block_breaks(&mut content_indent, &mut run, start)?;

        self.cursor.require(1)?;
        while self.cursor.mark.column as i64 == content_indent && !self.cursor.at_end() {
            let line_blank = self.cursor.at_blank();
            // In the folded style, exactly one newline between two
            // non-blank lines joins them with a space.
            if folded
                && after_content
                && run.starts_with('\n')
                && !prev_line_blank
                && !line_blank
            {
                if run.len() == 1 {
                    text.push(' ');
                } else {
                    text.push_str(&run[1..]);
                }
            } else {
                text.push_str(&run);
            }
            run.clear();
            after_content = true;
            prev_line_blank = line_blank;

            while !(self.cursor.at_break() || self.cursor.at_end()) {
                text.push(self.cursor.eat());
                self.cursor.require(1)?;
            }
            self.cursor.require(2)?;
            if let Some(br) = self.cursor.eat_line_break() {
                run.push(br);
            }
            end = self.gather_block_breaks(&mut content_indent, &mut run, start)?;
            self.cursor.require(1)?;
        }

        match chomping {
            Chomping::Strip => {}
            Chomping::Clip => {
                if after_content {
                    if let Some(final_break) = run.chars().next() {
                        text.push(final_break);
                    }
                }
            }
            Chomping::Keep => text.push_str(&run),
        }

        Ok(Token {
            data: TokenData::Scalar {
                value: text,
                style: if folded {
                    ScalarStyle::Folded
                } else {
                    ScalarStyle::Literal
                },
            },
            start_mark: start,
            end_mark: end,
        })
    }

    /// The escape table of the double-quoted style, single characters only;
    /// `\x`, `\u` and `\U` are handled by the caller.
    fn simple_escape(ch: char) -> Option<char> {
        Some(match ch {
            '0' => '\0',
            'a' => '\x07',
            'b' => '\x08',
            't' | '\t' => '\t',
            'n' => '\n',
            'v' => '\x0B',
            'f' => '\x0C',
            'r' => '\r',
            'e' => '\x1B',
            ' ' => ' ',
            '"' => '"',
            '/' => '/',
            '\\' => '\\',
            'N' => '\u{0085}',
            '_' => '\u{00a0}',
            'L' => '\u{2028}',
            'P' => '\u{2029}',
            _ => return None,
        })
    }

    /// Decode one `\` escape (the cursor sits on the backslash).
    fn read_escape(&mut self, start: Mark, text: &mut String) -> Result<(), ScannerError> {
        let hex_digits = match self.cursor.peek_at(1) {
            Some('x') => 2,
            Some('u') => 4,
            Some('U') => 8,
            Some(other) => {
                let Some(resolved) = Self::simple_escape(other) else {
                    return self.error(
                        "while parsing a quoted scalar",
                        start,
                        "found unknown escape character",
                    );
                };
                text.push(resolved);
                self.cursor.eat();
                self.cursor.eat();
                return Ok(());
            }
            None => {
                return self.error(
                    "while parsing a quoted scalar",
                    start,
                    "found unknown escape character",
                );
            }
        };
        self.cursor.eat();
        self.cursor.eat();
        self.cursor.require(hex_digits)?;
        let mut code: u32 = 0;
        for i in 0..hex_digits {
            let Some(digit) = self.cursor.hex_at(i) else {
                return self.error(
                    "while parsing a quoted scalar",
                    start,
                    "did not find expected hexadecimal number",
                );
            };
            code = code << 4 | digit;
        }
        let Some(resolved) = char::from_u32(code) else {
            return self.error(
                "while parsing a quoted scalar",
                start,
                "found invalid Unicode character escape code",
            );
        };
        text.push(resolved);
        for _ in 0..hex_digits {
            self.cursor.eat();
        }
        Ok(())
    }

    fn scan_quoted(&mut self, single: bool) -> Result<Token, ScannerError> {
        let quote = if single { '\'' } else { '"' };
        let start = self.cursor.mark;
        self.cursor.eat();
        let mut text = String::new();
        let mut join = LineJoin::default();
        loop {
            self.cursor.require(4)?;
            if self.at_any_document_indicator() {
                return self.error(
                    "while scanning a quoted scalar",
                    start,
                    "found unexpected document indicator",
                );
            }
            if self.cursor.at_end() {
                return self.error(
                    "while scanning a quoted scalar",
                    start,
                    "found unexpected end of stream",
                );
            }

            self.cursor.require(2)?;
            let mut closed = false;
            while !self.cursor.at_blankz() {
                join.flush_into(&mut text);
                if self.cursor.is(quote) {
                    if single && self.cursor.is_at(1, '\'') {
                        // A doubled quote is a literal apostrophe.
                        text.push('\'');
                        self.cursor.eat();
                        self.cursor.eat();
                        self.cursor.require(2)?;
                        continue;
                    }
                    closed = true;
                    break;
                }
                if !single && self.cursor.is('\\') && self.cursor.at_break_at(1) {
                    // An escaped break is cut out of the scalar entirely.
                    self.cursor.require(3)?;
                    self.cursor.eat();
                    self.cursor.eat_line_break();
                    join.escaped_break();
                    break;
                }
                if !single && self.cursor.is('\\') {
                    self.read_escape(start, &mut text)?;
                } else {
                    text.push(self.cursor.eat());
                }
                self.cursor.require(2)?;
            }
            if closed {
                self.cursor.eat();
                break;
            }

            // Collect the separation to the next content run.
            self.cursor.require(1)?;
            loop {
                match self.cursor.class() {
                    CharClass::Blank => {
                        if join.has_break() {
                            self.cursor.eat();
                        } else {
                            join.keep_space(self.cursor.eat());
                        }
                    }
                    CharClass::Break => {
                        self.cursor.require(2)?;
                        if let Some(br) = self.cursor.eat_line_break() {
                            join.keep_break(br);
                        }
                    }
                    _ => break,
                }
                self.cursor.require(1)?;
            }
        }

        Ok(Token {
            data: TokenData::Scalar {
                value: text,
                style: if single {
                    ScalarStyle::SingleQuoted
                } else {
                    ScalarStyle::DoubleQuoted
                },
            },
            start_mark: start,
            end_mark: self.cursor.mark,
        })
    }

    fn scan_plain(&mut self) -> Result<Token, ScannerError> {
        let start = self.cursor.mark;
        let mut end = start;
        let min_column = self.indent + 1;
        let mut text = String::new();
        let mut join = LineJoin::default();

        'lines: loop {
            self.cursor.require(4)?;
            if self.at_any_document_indicator() || self.cursor.is('#') {
                break;
            }
            while !self.cursor.at_blankz() {
                if self.flow_depth > 0
                    && self.cursor.is(':')
                    && matches!(
                        self.cursor.peek_at(1),
                        Some(',' | '?' | '[' | ']' | '{' | '}')
                    )
                {
                    return self.error(
                        "while scanning a plain scalar",
                        start,
                        "found unexpected ':'",
                    );
                }
                let at_value = self.cursor.is(':') && self.cursor.at_blankz_at(1);
                let at_flow_indicator = self.flow_depth > 0
                    && matches!(self.cursor.peek(), Some(',' | '[' | ']' | '{' | '}'));
                if at_value || at_flow_indicator {
                    break 'lines;
                }
                join.flush_into(&mut text);
                text.push(self.cursor.eat());
                end = self.cursor.mark;
                self.cursor.require(2)?;
            }
            if !(self.cursor.at_blank() || self.cursor.at_break()) {
                break;
            }

            self.cursor.require(1)?;
            loop {
                match self.cursor.class() {
                    CharClass::Blank => {
                        if join.has_break() {
                            if (self.cursor.mark.column as i64) < min_column
                                && self.cursor.is('\t')
                            {
                                return self.error(
                                    "while scanning a plain scalar",
                                    start,
                                    "found a tab character that violates indentation",
                                );
                            }
                            self.cursor.eat();
                        } else {
                            join.keep_space(self.cursor.eat());
                        }
                    }
                    CharClass::Break => {
                        self.cursor.require(2)?;
                        if let Some(br) = self.cursor.eat_line_break() {
                            join.keep_break(br);
                        }
                    }
                    _ => break,
                }
                self.cursor.require(1)?;
            }
            if self.flow_depth == 0 && (self.cursor.mark.column as i64) < min_column {
                break;
            }
        }

        // A scalar interrupted by a line break leaves room for a new key.
        if join.has_break() {
            self.key_allowed = true;
        }

        Ok(Token {
            data: TokenData::Scalar {
                value: text,
                style: ScalarStyle::Plain,
            },
            start_mark: start,
            end_mark: end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(input: &str) -> Vec<TokenData> {
        let mut bytes = input.as_bytes();
        let mut scanner = Scanner::new();
        scanner.set_input(&mut bytes);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.scan().expect("scan error");
            let done = matches!(token.data, TokenData::StreamEnd);
            tokens.push(token.data);
            if done {
                break;
            }
        }
        tokens
    }

    #[test]
    fn simple_key_retrofit_orders_tokens() {
        let tokens = scan_all("key: value\n");
        assert_eq!(
            tokens,
            vec![
                TokenData::StreamStart {
                    encoding: Encoding::Utf8
                },
                TokenData::BlockMappingStart,
                TokenData::Key,
                TokenData::Scalar {
                    value: "key".into(),
                    style: ScalarStyle::Plain
                },
                TokenData::Value,
                TokenData::Scalar {
                    value: "value".into(),
                    style: ScalarStyle::Plain
                },
                TokenData::BlockEnd,
                TokenData::StreamEnd,
            ]
        );
    }

    #[test]
    fn nested_indentation_unrolls() {
        let tokens = scan_all("a:\n  b: 1\nc: 2\n");
        let block_ends = tokens
            .iter()
            .filter(|data| matches!(data, TokenData::BlockEnd))
            .count();
        assert_eq!(block_ends, 2);
    }

    #[test]
    fn flow_tokens() {
        let tokens = scan_all("[a, {b: c}]");
        assert!(tokens.contains(&TokenData::FlowSequenceStart));
        assert!(tokens.contains(&TokenData::FlowMappingStart));
        assert!(tokens.contains(&TokenData::FlowEntry));
        assert!(tokens.contains(&TokenData::FlowMappingEnd));
        assert!(tokens.contains(&TokenData::FlowSequenceEnd));
    }

    #[test]
    fn double_quoted_escapes() {
        let tokens = scan_all("v: \"\\x41\\u00e9\\U0001F600\"\n");
        assert!(tokens.contains(&TokenData::Scalar {
            value: "A\u{e9}\u{1F600}".into(),
            style: ScalarStyle::DoubleQuoted,
        }));
    }

    #[test]
    fn single_quote_doubling() {
        let tokens = scan_all("v: 'it''s'\n");
        assert!(tokens.contains(&TokenData::Scalar {
            value: "it's".into(),
            style: ScalarStyle::SingleQuoted,
        }));
    }

    #[test]
    fn quoted_scalar_folds_line_breaks() {
        let tokens = scan_all("v: \"one\n  two\"\n");
        assert!(tokens.contains(&TokenData::Scalar {
            value: "one two".into(),
            style: ScalarStyle::DoubleQuoted,
        }));
    }

    #[test]
    fn folded_scalar_with_strip_chomping() {
        let tokens = scan_all("value: >-\n  one\n  two\n\n  three\n");
        assert!(tokens.contains(&TokenData::Scalar {
            value: "one two\nthree".into(),
            style: ScalarStyle::Folded,
        }));
    }

    #[test]
    fn literal_scalar_keeps_breaks() {
        let tokens = scan_all("value: |\n  one\n  two\n");
        assert!(tokens.contains(&TokenData::Scalar {
            value: "one\ntwo\n".into(),
            style: ScalarStyle::Literal,
        }));
    }

    #[test]
    fn block_scalar_keep_chomping() {
        let tokens = scan_all("value: |+\n  one\n\n\n");
        assert!(tokens.contains(&TokenData::Scalar {
            value: "one\n\n\n".into(),
            style: ScalarStyle::Literal,
        }));
    }

    #[test]
    fn block_scalar_with_leading_blank_line() {
        let tokens = scan_all("value: >\n\n  one\n");
        assert!(tokens.contains(&TokenData::Scalar {
            value: "\none\n".into(),
            style: ScalarStyle::Folded,
        }));
    }

    #[test]
    fn zero_indent_indicator_is_rejected() {
        let mut bytes: &[u8] = b"value: |0\n  x\n";
        let mut scanner = Scanner::new();
        scanner.set_input(&mut bytes);
        let err = loop {
            match scanner.scan() {
                Ok(token) => {
                    if matches!(token.data, TokenData::StreamEnd) {
                        panic!("expected scanner error");
                    }
                }
                Err(err) => break err,
            }
        };
        assert!(err.to_string().contains("indentation indicator equal to 0"));
    }

    #[test]
    fn directives_are_scanned() {
        let tokens = scan_all("%YAML 1.1\n%TAG !e! tag:example.com,2000:\n---\nx\n");
        assert!(tokens.contains(&TokenData::VersionDirective { major: 1, minor: 1 }));
        assert!(tokens.contains(&TokenData::TagDirective {
            handle: "!e!".into(),
            prefix: "tag:example.com,2000:".into(),
        }));
        assert!(tokens.contains(&TokenData::DocumentStart));
    }

    #[test]
    fn tag_uri_escapes_decode_utf8() {
        let tokens = scan_all("!<tag:example.com/%C3%A9> x\n");
        assert!(tokens.contains(&TokenData::Tag {
            handle: String::new(),
            suffix: "tag:example.com/\u{e9}".into(),
        }));
    }

    #[test]
    fn anchors_and_aliases() {
        let tokens = scan_all("a: &anchor 1\nb: *anchor\n");
        assert!(tokens.contains(&TokenData::Anchor {
            value: "anchor".into()
        }));
        assert!(tokens.contains(&TokenData::Alias {
            value: "anchor".into()
        }));
    }
}
