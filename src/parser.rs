//! The parser: tokens in, events out.
//!
//! A single state cursor plus a stack of continuation states drive the
//! grammar. Every [`Parser::parse`] call consumes zero or more tokens and
//! emits exactly one event; a missing node (for example a KEY followed
//! directly by VALUE) synthesises an empty plain scalar event.

use crate::scanner::Scanner;
use crate::{
    Encoding, Event, EventData, MappingStyle, Mark, ParserError, ScalarStyle, SequenceStyle,
    TagDirective, TokenData, VersionDirective,
};

/// The states of the parser.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum ParserState {
    /// Expect STREAM-START.
    #[default]
    StreamStart,
    /// Expect the beginning of an implicit document.
    ImplicitDocumentStart,
    /// Expect DOCUMENT-START.
    DocumentStart,
    /// Expect the content of a document.
    DocumentContent,
    /// Expect DOCUMENT-END.
    DocumentEnd,
    /// Expect a block node.
    BlockNode,
    /// Expect a block node or indentless sequence.
    BlockNodeOrIndentlessSequence,
    /// Expect a flow node.
    FlowNode,
    /// Expect the first entry of a block sequence.
    BlockSequenceFirstEntry,
    /// Expect an entry of a block sequence.
    BlockSequenceEntry,
    /// Expect an entry of an indentless sequence.
    IndentlessSequenceEntry,
    /// Expect the first key of a block mapping.
    BlockMappingFirstKey,
    /// Expect a block mapping key.
    BlockMappingKey,
    /// Expect a block mapping value.
    BlockMappingValue,
    /// Expect the first entry of a flow sequence.
    FlowSequenceFirstEntry,
    /// Expect an entry of a flow sequence.
    FlowSequenceEntry,
    /// Expect a key of an ordered mapping.
    FlowSequenceEntryMappingKey,
    /// Expect a value of an ordered mapping.
    FlowSequenceEntryMappingValue,
    /// Expect the end of an ordered mapping entry.
    FlowSequenceEntryMappingEnd,
    /// Expect the first key of a flow mapping.
    FlowMappingFirstKey,
    /// Expect a key of a flow mapping.
    FlowMappingKey,
    /// Expect a value of a flow mapping.
    FlowMappingValue,
    /// Expect an empty value of a flow mapping.
    FlowMappingEmptyValue,
    /// Expect nothing.
    End,
}

/// The node properties: an anchor and a tag, in either order, at most one
/// of each.
struct NodeProperties {
    anchor: Option<String>,
    handle: Option<String>,
    suffix: Option<String>,
    start_mark: Mark,
    end_mark: Mark,
    tag_mark: Mark,
}

/// The parser structure.
#[non_exhaustive]
pub struct Parser<'r> {
    pub(crate) scanner: Scanner<'r>,
    /// The current parser state.
    pub(crate) state: ParserState,
    /// The stack of continuation states.
    pub(crate) states: Vec<ParserState>,
    /// Start marks of the collections being parsed, for error context.
    open_marks: Vec<Mark>,
    /// The TAG directives in effect for the current document.
    pub(crate) tag_directives: Vec<TagDirective>,
}

impl<'r> Default for Parser<'r> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Parser<'r> {
    /// Create a parser.
    pub fn new() -> Parser<'r> {
        Parser {
            scanner: Scanner::new(),
            state: ParserState::default(),
            states: Vec::with_capacity(16),
            open_marks: Vec::with_capacity(16),
            tag_directives: Vec::with_capacity(16),
        }
    }

    /// Reset the parser state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Set a string input.
    pub fn set_input_string(&mut self, input: &'r mut &[u8]) {
        self.scanner.set_input_string(input);
    }

    /// Set a generic input handler.
    pub fn set_input(&mut self, input: &'r mut dyn std::io::BufRead) {
        self.scanner.set_input(input);
    }

    /// Set the source encoding, overriding detection.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.scanner.set_encoding(encoding);
    }

    /// Parse the input stream and produce the next parsing event.
    ///
    /// Call the function subsequently to produce a sequence of events
    /// corresponding to the input stream. The initial event is
    /// [`EventData::StreamStart`] and the final one [`EventData::StreamEnd`];
    /// after that, every further call returns STREAM-END again.
    pub fn parse(&mut self) -> Result<Event, ParserError> {
        if self.state == ParserState::End || self.scanner.is_finished() {
            return Ok(Event::stream_end());
        }
        match self.state {
            ParserState::StreamStart => self.stream_start(),
            ParserState::ImplicitDocumentStart => self.document_start(true),
            ParserState::DocumentStart => self.document_start(false),
            ParserState::DocumentContent => self.document_content(),
            ParserState::DocumentEnd => self.document_end(),
            ParserState::BlockNode => self.node(true, false),
            ParserState::BlockNodeOrIndentlessSequence => self.node(true, true),
            ParserState::FlowNode => self.node(false, false),
            ParserState::BlockSequenceFirstEntry => self.block_sequence_entry(true),
            ParserState::BlockSequenceEntry => self.block_sequence_entry(false),
            ParserState::IndentlessSequenceEntry => self.indentless_sequence_entry(),
            ParserState::BlockMappingFirstKey => self.block_mapping_key(true),
            ParserState::BlockMappingKey => self.block_mapping_key(false),
            ParserState::BlockMappingValue => self.block_mapping_value(),
            ParserState::FlowSequenceFirstEntry => self.flow_sequence_entry(true),
            ParserState::FlowSequenceEntry => self.flow_sequence_entry(false),
            ParserState::FlowSequenceEntryMappingKey => self.flow_sequence_entry_mapping_key(),
            ParserState::FlowSequenceEntryMappingValue => self.flow_sequence_entry_mapping_value(),
            ParserState::FlowSequenceEntryMappingEnd => self.flow_sequence_entry_mapping_end(),
            ParserState::FlowMappingFirstKey => self.flow_mapping_key(true),
            ParserState::FlowMappingKey => self.flow_mapping_key(false),
            ParserState::FlowMappingValue => self.flow_mapping_value(false),
            ParserState::FlowMappingEmptyValue => self.flow_mapping_value(true),
            ParserState::End => unreachable!("end state handled above"),
        }
    }

    fn parse_error<T>(problem: &'static str, mark: Mark) -> Result<T, ParserError> {
        Err(ParserError::Problem { problem, mark })
    }

    fn parse_error_in<T>(
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        mark: Mark,
    ) -> Result<T, ParserError> {
        Err(ParserError::ProblemWithContext {
            context,
            context_mark,
            problem,
            mark,
        })
    }

    /// A missing node synthesises an empty plain scalar.
    fn missing_node(mark: Mark) -> Event {
        Event {
            data: EventData::Scalar {
                anchor: None,
                tag: None,
                value: String::new(),
                plain_implicit: true,
                quoted_implicit: false,
                style: ScalarStyle::Plain,
            },
            start_mark: mark,
            end_mark: mark,
        }
    }

    fn stream_start(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        let TokenData::StreamStart { encoding } = token.data else {
            return Self::parse_error("did not find expected <stream-start>", token.start_mark);
        };
        let event = Event {
            data: EventData::StreamStart { encoding },
            start_mark: token.start_mark,
            end_mark: token.end_mark,
        };
        self.state = ParserState::ImplicitDocumentStart;
        self.scanner.pop_head();
        Ok(event)
    }

    fn document_start(&mut self, implicit: bool) -> Result<Event, ParserError> {
        if !implicit {
            while matches!(self.scanner.head()?.data, TokenData::DocumentEnd) {
                self.scanner.pop_head();
            }
        }

        let token = self.scanner.head()?;
        let start_mark = token.start_mark;
        let end_mark = token.end_mark;

        if matches!(token.data, TokenData::StreamEnd) {
            self.state = ParserState::End;
            self.scanner.pop_head();
            return Ok(Event {
                data: EventData::StreamEnd,
                start_mark,
                end_mark,
            });
        }

        let has_directives = matches!(
            token.data,
            TokenData::VersionDirective { .. }
                | TokenData::TagDirective { .. }
                | TokenData::DocumentStart
        );
        if implicit && !has_directives {
            // A bare document begins at the first content token.
            self.seed_default_tag_handles(start_mark)?;
            self.states.push(ParserState::DocumentEnd);
            self.state = ParserState::BlockNode;
            return Ok(Event {
                data: EventData::DocumentStart {
                    version_directive: None,
                    tag_directives: vec![],
                    implicit: true,
                },
                start_mark,
                end_mark,
            });
        }

        let (version_directive, tag_directives) = self.read_directives()?;
        let token = self.scanner.head()?;
        if !matches!(token.data, TokenData::DocumentStart) {
            return Self::parse_error("did not find expected <document start>", token.start_mark);
        }
        let event = Event {
            data: EventData::DocumentStart {
                version_directive,
                tag_directives,
                implicit: false,
            },
            start_mark,
            end_mark: token.end_mark,
        };
        self.states.push(ParserState::DocumentEnd);
        self.state = ParserState::DocumentContent;
        self.scanner.pop_head();
        Ok(event)
    }

    fn document_content(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        match token.data {
            TokenData::VersionDirective { .. }
            | TokenData::TagDirective { .. }
            | TokenData::DocumentStart
            | TokenData::DocumentEnd
            | TokenData::StreamEnd => {
                let mark = token.start_mark;
                self.state = self.states.pop().expect("state stack underflow");
                Ok(Self::missing_node(mark))
            }
            _ => self.node(true, false),
        }
    }

    fn document_end(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        let start_mark = token.start_mark;
        let mut end_mark = start_mark;
        let mut implicit = true;
        if matches!(token.data, TokenData::DocumentEnd) {
            end_mark = token.end_mark;
            implicit = false;
            self.scanner.pop_head();
        }
        // The directive table does not survive the document; defaults are
        // re-seeded when the next one starts.
        self.tag_directives.clear();
        self.state = ParserState::DocumentStart;
        Ok(Event {
            data: EventData::DocumentEnd { implicit },
            start_mark,
            end_mark,
        })
    }

    /// Consume anchor and tag tokens, in either order, at most one each.
    fn node_properties(&mut self) -> Result<NodeProperties, ParserError> {
        let head = self.scanner.head()?;
        let mut props = NodeProperties {
            anchor: None,
            handle: None,
            suffix: None,
            start_mark: head.start_mark,
            end_mark: head.start_mark,
            tag_mark: Mark::default(),
        };
        loop {
            let token = self.scanner.head_mut()?;
            match &mut token.data {
                TokenData::Anchor { value } if props.anchor.is_none() => {
                    props.anchor = Some(std::mem::take(value));
                    props.end_mark = token.end_mark;
                    self.scanner.pop_head();
                }
                TokenData::Tag { handle, suffix } if props.handle.is_none() => {
                    props.handle = Some(std::mem::take(handle));
                    props.suffix = Some(std::mem::take(suffix));
                    props.tag_mark = token.start_mark;
                    props.end_mark = token.end_mark;
                    self.scanner.pop_head();
                }
                _ => break,
            }
        }
        Ok(props)
    }

    /// Resolve a tag token against the directive table: an empty handle is
    /// the verbatim `!<uri>` form, anything else looks up its prefix.
    fn resolve_tag(&self, props: &NodeProperties) -> Result<Option<String>, ParserError> {
        let Some(handle) = props.handle.as_deref() else {
            return Ok(None);
        };
        if handle.is_empty() {
            return Ok(props.suffix.clone());
        }
        for directive in &self.tag_directives {
            if directive.handle == handle {
                let suffix = props.suffix.as_deref().unwrap_or("");
                return Ok(Some(format!("{}{}", directive.prefix, suffix)));
            }
        }
        Self::parse_error_in(
            "while parsing a node",
            props.start_mark,
            "found undefined tag handle",
            props.tag_mark,
        )
    }

    fn node(&mut self, block: bool, indentless_ok: bool) -> Result<Event, ParserError> {
        let token = self.scanner.head_mut()?;
        if let TokenData::Alias { value } = &mut token.data {
            let event = Event {
                data: EventData::Alias {
                    anchor: std::mem::take(value),
                },
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = self.states.pop().expect("state stack underflow");
            self.scanner.pop_head();
            return Ok(event);
        }

        let props = self.node_properties()?;
        let tag = self.resolve_tag(&props)?;
        let implicit = tag.as_deref().unwrap_or("").is_empty();
        let NodeProperties {
            anchor,
            start_mark,
            end_mark,
            ..
        } = props;

        let token = self.scanner.head_mut()?;
        match &mut token.data {
            TokenData::BlockEntry if indentless_ok => {
                let end_mark = token.end_mark;
                self.state = ParserState::IndentlessSequenceEntry;
                Ok(Event {
                    data: EventData::SequenceStart {
                        anchor,
                        tag,
                        implicit,
                        style: SequenceStyle::Block,
                    },
                    start_mark,
                    end_mark,
                })
            }
            TokenData::Scalar { value, style } => {
                let style = *style;
                let (plain_implicit, quoted_implicit) =
                    if style == ScalarStyle::Plain && tag.is_none() || tag.as_deref() == Some("!") {
                        (true, false)
                    } else if tag.is_none() {
                        (false, true)
                    } else {
                        (false, false)
                    };
                let event = Event {
                    data: EventData::Scalar {
                        anchor,
                        tag,
                        value: std::mem::take(value),
                        plain_implicit,
                        quoted_implicit,
                        style,
                    },
                    start_mark,
                    end_mark: token.end_mark,
                };
                self.state = self.states.pop().expect("state stack underflow");
                self.scanner.pop_head();
                Ok(event)
            }
            TokenData::FlowSequenceStart => {
                let end_mark = token.end_mark;
                self.state = ParserState::FlowSequenceFirstEntry;
                Ok(Event {
                    data: EventData::SequenceStart {
                        anchor,
                        tag,
                        implicit,
                        style: SequenceStyle::Flow,
                    },
                    start_mark,
                    end_mark,
                })
            }
            TokenData::FlowMappingStart => {
                let end_mark = token.end_mark;
                self.state = ParserState::FlowMappingFirstKey;
                Ok(Event {
                    data: EventData::MappingStart {
                        anchor,
                        tag,
                        implicit,
                        style: MappingStyle::Flow,
                    },
                    start_mark,
                    end_mark,
                })
            }
            TokenData::BlockSequenceStart if block => {
                let end_mark = token.end_mark;
                self.state = ParserState::BlockSequenceFirstEntry;
                Ok(Event {
                    data: EventData::SequenceStart {
                        anchor,
                        tag,
                        implicit,
                        style: SequenceStyle::Block,
                    },
                    start_mark,
                    end_mark,
                })
            }
            TokenData::BlockMappingStart if block => {
                let end_mark = token.end_mark;
                self.state = ParserState::BlockMappingFirstKey;
                Ok(Event {
                    data: EventData::MappingStart {
                        anchor,
                        tag,
                        implicit,
                        style: MappingStyle::Block,
                    },
                    start_mark,
                    end_mark,
                })
            }
            _ if anchor.is_some() || tag.is_some() => {
                // Properties with no content stand for an empty scalar.
                self.state = self.states.pop().expect("state stack underflow");
                Ok(Event {
                    data: EventData::Scalar {
                        anchor,
                        tag,
                        value: String::new(),
                        plain_implicit: implicit,
                        quoted_implicit: false,
                        style: ScalarStyle::Plain,
                    },
                    start_mark,
                    end_mark,
                })
            }
            _ => {
                let problem_mark = token.start_mark;
                Self::parse_error_in(
                    if block {
                        "while parsing a block node"
                    } else {
                        "while parsing a flow node"
                    },
                    start_mark,
                    "did not find expected node content",
                    problem_mark,
                )
            }
        }
    }

    fn block_sequence_entry(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let mark = self.scanner.head()?.start_mark;
            self.open_marks.push(mark);
            self.scanner.pop_head();
        }

        let token = self.scanner.head()?;
        match token.data {
            TokenData::BlockEntry => {
                let mark = token.end_mark;
                self.scanner.pop_head();
                let next = self.scanner.head()?;
                if matches!(next.data, TokenData::BlockEntry | TokenData::BlockEnd) {
                    self.state = ParserState::BlockSequenceEntry;
                    Ok(Self::missing_node(mark))
                } else {
                    self.states.push(ParserState::BlockSequenceEntry);
                    self.node(true, false)
                }
            }
            TokenData::BlockEnd => {
                let event = Event {
                    data: EventData::SequenceEnd,
                    start_mark: token.start_mark,
                    end_mark: token.end_mark,
                };
                self.state = self.states.pop().expect("state stack underflow");
                self.open_marks.pop();
                self.scanner.pop_head();
                Ok(event)
            }
            _ => {
                let problem_mark = token.start_mark;
                let context_mark = self.open_marks.pop().expect("mark stack underflow");
                Self::parse_error_in(
                    "while parsing a block collection",
                    context_mark,
                    "did not find expected '-' indicator",
                    problem_mark,
                )
            }
        }
    }

    fn indentless_sequence_entry(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        if !matches!(token.data, TokenData::BlockEntry) {
            // An indentless sequence has no BLOCK-END; any other token
            // closes it.
            let event = Event {
                data: EventData::SequenceEnd,
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            };
            self.state = self.states.pop().expect("state stack underflow");
            return Ok(event);
        }
        let mark = token.end_mark;
        self.scanner.pop_head();
        let next = self.scanner.head()?;
        if matches!(
            next.data,
            TokenData::BlockEntry | TokenData::Key | TokenData::Value | TokenData::BlockEnd
        ) {
            self.state = ParserState::IndentlessSequenceEntry;
            Ok(Self::missing_node(mark))
        } else {
            self.states.push(ParserState::IndentlessSequenceEntry);
            self.node(true, false)
        }
    }

    fn block_mapping_key(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let mark = self.scanner.head()?.start_mark;
            self.open_marks.push(mark);
            self.scanner.pop_head();
        }

        let token = self.scanner.head()?;
        match token.data {
            TokenData::Key => {
                let mark = token.end_mark;
                self.scanner.pop_head();
                let next = self.scanner.head()?;
                if matches!(
                    next.data,
                    TokenData::Key | TokenData::Value | TokenData::BlockEnd
                ) {
                    self.state = ParserState::BlockMappingValue;
                    Ok(Self::missing_node(mark))
                } else {
                    self.states.push(ParserState::BlockMappingValue);
                    self.node(true, true)
                }
            }
            TokenData::BlockEnd => {
                let event = Event {
                    data: EventData::MappingEnd,
                    start_mark: token.start_mark,
                    end_mark: token.end_mark,
                };
                self.state = self.states.pop().expect("state stack underflow");
                self.open_marks.pop();
                self.scanner.pop_head();
                Ok(event)
            }
            _ => {
                let problem_mark = token.start_mark;
                let context_mark = self.open_marks.pop().expect("mark stack underflow");
                Self::parse_error_in(
                    "while parsing a block mapping",
                    context_mark,
                    "did not find expected key",
                    problem_mark,
                )
            }
        }
    }

    fn block_mapping_value(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        if !matches!(token.data, TokenData::Value) {
            let mark = token.start_mark;
            self.state = ParserState::BlockMappingKey;
            return Ok(Self::missing_node(mark));
        }
        let mark = token.end_mark;
        self.scanner.pop_head();
        let next = self.scanner.head()?;
        if matches!(
            next.data,
            TokenData::Key | TokenData::Value | TokenData::BlockEnd
        ) {
            self.state = ParserState::BlockMappingKey;
            Ok(Self::missing_node(mark))
        } else {
            self.states.push(ParserState::BlockMappingKey);
            self.node(true, true)
        }
    }

    fn flow_sequence_entry(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let mark = self.scanner.head()?.start_mark;
            self.open_marks.push(mark);
            self.scanner.pop_head();
        } else {
            let token = self.scanner.head()?;
            match token.data {
                TokenData::FlowSequenceEnd => {}
                TokenData::FlowEntry => self.scanner.pop_head(),
                _ => {
                    let problem_mark = token.start_mark;
                    let context_mark = self.open_marks.pop().expect("mark stack underflow");
                    return Self::parse_error_in(
                        "while parsing a flow sequence",
                        context_mark,
                        "did not find expected ',' or ']'",
                        problem_mark,
                    );
                }
            }
        }

        let token = self.scanner.head()?;
        match token.data {
            TokenData::FlowSequenceEnd => {
                let event = Event {
                    data: EventData::SequenceEnd,
                    start_mark: token.start_mark,
                    end_mark: token.end_mark,
                };
                self.state = self.states.pop().expect("state stack underflow");
                self.open_marks.pop();
                self.scanner.pop_head();
                Ok(event)
            }
            TokenData::Key => {
                // A `?` inside a flow sequence opens a single-pair mapping.
                let event = Event {
                    data: EventData::MappingStart {
                        anchor: None,
                        tag: None,
                        implicit: true,
                        style: MappingStyle::Flow,
                    },
                    start_mark: token.start_mark,
                    end_mark: token.end_mark,
                };
                self.state = ParserState::FlowSequenceEntryMappingKey;
                self.scanner.pop_head();
                Ok(event)
            }
            _ => {
                self.states.push(ParserState::FlowSequenceEntry);
                self.node(false, false)
            }
        }
    }

    fn flow_sequence_entry_mapping_key(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        if matches!(
            token.data,
            TokenData::Value | TokenData::FlowEntry | TokenData::FlowSequenceEnd
        ) {
            let mark = token.end_mark;
            self.state = ParserState::FlowSequenceEntryMappingValue;
            self.scanner.pop_head();
            Ok(Self::missing_node(mark))
        } else {
            self.states.push(ParserState::FlowSequenceEntryMappingValue);
            self.node(false, false)
        }
    }

    fn flow_sequence_entry_mapping_value(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        if matches!(token.data, TokenData::Value) {
            self.scanner.pop_head();
            let next = self.scanner.head()?;
            if !matches!(
                next.data,
                TokenData::FlowEntry | TokenData::FlowSequenceEnd
            ) {
                self.states.push(ParserState::FlowSequenceEntryMappingEnd);
                return self.node(false, false);
            }
            let mark = next.start_mark;
            self.state = ParserState::FlowSequenceEntryMappingEnd;
            return Ok(Self::missing_node(mark));
        }
        let mark = token.start_mark;
        self.state = ParserState::FlowSequenceEntryMappingEnd;
        Ok(Self::missing_node(mark))
    }

    fn flow_sequence_entry_mapping_end(&mut self) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        let event = Event {
            data: EventData::MappingEnd,
            start_mark: token.start_mark,
            end_mark: token.end_mark,
        };
        self.state = ParserState::FlowSequenceEntry;
        Ok(event)
    }

    fn flow_mapping_key(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let mark = self.scanner.head()?.start_mark;
            self.open_marks.push(mark);
            self.scanner.pop_head();
        } else {
            let token = self.scanner.head()?;
            match token.data {
                TokenData::FlowMappingEnd => {}
                TokenData::FlowEntry => self.scanner.pop_head(),
                _ => {
                    let problem_mark = token.start_mark;
                    let context_mark = self.open_marks.pop().expect("mark stack underflow");
                    return Self::parse_error_in(
                        "while parsing a flow mapping",
                        context_mark,
                        "did not find expected ',' or '}'",
                        problem_mark,
                    );
                }
            }
        }

        let token = self.scanner.head()?;
        match token.data {
            TokenData::FlowMappingEnd => {
                let event = Event {
                    data: EventData::MappingEnd,
                    start_mark: token.start_mark,
                    end_mark: token.end_mark,
                };
                self.state = self.states.pop().expect("state stack underflow");
                self.open_marks.pop();
                self.scanner.pop_head();
                Ok(event)
            }
            TokenData::Key => {
                self.scanner.pop_head();
                let next = self.scanner.head()?;
                if matches!(
                    next.data,
                    TokenData::Value | TokenData::FlowEntry | TokenData::FlowMappingEnd
                ) {
                    let mark = next.start_mark;
                    self.state = ParserState::FlowMappingValue;
                    Ok(Self::missing_node(mark))
                } else {
                    self.states.push(ParserState::FlowMappingValue);
                    self.node(false, false)
                }
            }
            _ => {
                self.states.push(ParserState::FlowMappingEmptyValue);
                self.node(false, false)
            }
        }
    }

    fn flow_mapping_value(&mut self, empty: bool) -> Result<Event, ParserError> {
        let token = self.scanner.head()?;
        if empty {
            let mark = token.start_mark;
            self.state = ParserState::FlowMappingKey;
            return Ok(Self::missing_node(mark));
        }
        if matches!(token.data, TokenData::Value) {
            self.scanner.pop_head();
            let next = self.scanner.head()?;
            if !matches!(next.data, TokenData::FlowEntry | TokenData::FlowMappingEnd) {
                self.states.push(ParserState::FlowMappingKey);
                return self.node(false, false);
            }
            let mark = next.start_mark;
            self.state = ParserState::FlowMappingKey;
            return Ok(Self::missing_node(mark));
        }
        let mark = token.start_mark;
        self.state = ParserState::FlowMappingKey;
        Ok(Self::missing_node(mark))
    }

    /// Consume the `%YAML` and `%TAG` tokens in front of a document and
    /// seed the directive table. Only YAML 1.1 is accepted.
    fn read_directives(
        &mut self,
    ) -> Result<(Option<VersionDirective>, Vec<TagDirective>), ParserError> {
        let mut version: Option<VersionDirective> = None;
        let mut collected: Vec<TagDirective> = Vec::new();
        loop {
            let token = self.scanner.head_mut()?;
            match &mut token.data {
                TokenData::VersionDirective { major, minor } => {
                    let mark = token.start_mark;
                    if version.is_some() {
                        return Self::parse_error("found duplicate %YAML directive", mark);
                    }
                    if *major != 1 || *minor != 1 {
                        return Self::parse_error("found incompatible YAML document", mark);
                    }
                    version = Some(VersionDirective {
                        major: *major,
                        minor: *minor,
                    });
                    self.scanner.pop_head();
                }
                TokenData::TagDirective { handle, prefix } => {
                    let directive = TagDirective {
                        handle: std::mem::take(handle),
                        prefix: std::mem::take(prefix),
                    };
                    let mark = token.start_mark;
                    self.define_tag_handle(directive.clone(), false, mark)?;
                    collected.push(directive);
                    self.scanner.pop_head();
                }
                _ => break,
            }
        }
        let mark = self.scanner.head()?.start_mark;
        self.seed_default_tag_handles(mark)?;
        Ok((version, collected))
    }

    fn seed_default_tag_handles(&mut self, mark: Mark) -> Result<(), ParserError> {
        for (handle, prefix) in [("!", "!"), ("!!", "tag:yaml.org,2002:")] {
            self.define_tag_handle(
                TagDirective {
                    handle: String::from(handle),
                    prefix: String::from(prefix),
                },
                true,
                mark,
            )?;
        }
        Ok(())
    }

    fn define_tag_handle(
        &mut self,
        directive: TagDirective,
        allow_existing: bool,
        mark: Mark,
    ) -> Result<(), ParserError> {
        if self
            .tag_directives
            .iter()
            .any(|existing| existing.handle == directive.handle)
        {
            if allow_existing {
                return Ok(());
            }
            return Self::parse_error("found duplicate %TAG directive", mark);
        }
        self.tag_directives.push(directive);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Result<Vec<EventData>, ParserError> {
        let mut bytes = input.as_bytes();
        let mut parser = Parser::new();
        parser.set_input(&mut bytes);
        let mut events = Vec::new();
        loop {
            let event = parser.parse()?;
            let done = matches!(event.data, EventData::StreamEnd);
            events.push(event.data);
            if done {
                break;
            }
        }
        Ok(events)
    }

    #[test]
    fn empty_stream() {
        let events = parse_all("").unwrap();
        assert_eq!(
            events,
            vec![
                EventData::StreamStart {
                    encoding: Encoding::Utf8
                },
                EventData::StreamEnd,
            ]
        );
    }

    #[test]
    fn missing_flow_value_is_an_empty_scalar() {
        let events = parse_all("{ a: 1, b: [2, 3], c: }").unwrap();
        let empty_scalars = events
            .iter()
            .filter(|data| {
                matches!(
                    data,
                    EventData::Scalar { value, .. } if value.is_empty()
                )
            })
            .count();
        assert_eq!(empty_scalars, 1);
    }

    #[test]
    fn tag_resolution_uses_directives() {
        let events = parse_all("%TAG !e! tag:example.com,2000:\n--- !e!thing\nx\n").unwrap();
        assert!(events.iter().any(|data| matches!(
            data,
            EventData::Scalar { tag: Some(tag), .. } if tag == "tag:example.com,2000:thing"
        )));
    }

    #[test]
    fn undefined_tag_handle_is_an_error() {
        let err = parse_all("--- !x!thing\nvalue\n").unwrap_err();
        assert!(err.to_string().contains("found undefined tag handle"));
    }

    #[test]
    fn yaml_12_is_rejected() {
        let err = parse_all("%YAML 1.2\n---\nx\n").unwrap_err();
        assert!(err.to_string().contains("found incompatible YAML document"));
    }

    #[test]
    fn duplicate_version_directive_is_an_error() {
        let err = parse_all("%YAML 1.1\n%YAML 1.1\n---\nx\n").unwrap_err();
        assert!(err.to_string().contains("found duplicate %YAML directive"));
    }

    #[test]
    fn explicit_documents() {
        let events = parse_all("---\na\n---\nb\n").unwrap();
        let document_starts = events
            .iter()
            .filter(|data| matches!(data, EventData::DocumentStart { .. }))
            .count();
        assert_eq!(document_starts, 2);
    }

    #[test]
    fn anchored_mapping_produces_anchor() {
        let events = parse_all("a: &x\n  b: 1\n").unwrap();
        assert!(events.iter().any(|data| matches!(
            data,
            EventData::MappingStart { anchor: Some(anchor), .. } if anchor == "x"
        )));
    }
}
