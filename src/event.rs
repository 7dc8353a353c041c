use crate::{
    Encoding, MappingStyle, Mark, ScalarStyle, SequenceStyle, TagDirective, VersionDirective,
};

/// An event produced by the [`Parser`](crate::Parser).
#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub struct Event {
    /// The event kind and payload.
    pub data: EventData,
    /// The beginning of the event.
    pub start_mark: Mark,
    /// The end of the event.
    pub end_mark: Mark,
}

/// The event alphabet.
#[derive(Debug, PartialEq)]
pub enum EventData {
    /// STREAM-START.
    StreamStart {
        /// The document encoding.
        encoding: Encoding,
    },
    /// STREAM-END.
    StreamEnd,
    /// DOCUMENT-START.
    DocumentStart {
        /// The version directive, when one was given.
        version_directive: Option<VersionDirective>,
        /// The tag directives in effect.
        tag_directives: Vec<TagDirective>,
        /// Is the document indicator implicit?
        implicit: bool,
    },
    /// DOCUMENT-END.
    DocumentEnd {
        /// Is the document end indicator implicit?
        implicit: bool,
    },
    /// ALIAS.
    Alias {
        /// The anchor name.
        anchor: String,
    },
    /// SCALAR.
    Scalar {
        /// The anchor, if any.
        anchor: Option<String>,
        /// The resolved tag, if any.
        tag: Option<String>,
        /// The scalar value.
        value: String,
        /// Is the tag optional for the plain style?
        plain_implicit: bool,
        /// Is the tag optional for any non-plain style?
        quoted_implicit: bool,
        /// The scalar style.
        style: ScalarStyle,
    },
    /// SEQUENCE-START.
    SequenceStart {
        /// The anchor, if any.
        anchor: Option<String>,
        /// The resolved tag, if any.
        tag: Option<String>,
        /// Is the tag optional?
        implicit: bool,
        /// The sequence style.
        style: SequenceStyle,
    },
    /// SEQUENCE-END.
    SequenceEnd,
    /// MAPPING-START.
    MappingStart {
        /// The anchor, if any.
        anchor: Option<String>,
        /// The resolved tag, if any.
        tag: Option<String>,
        /// Is the tag optional?
        implicit: bool,
        /// The mapping style.
        style: MappingStyle,
    },
    /// MAPPING-END.
    MappingEnd,
}

impl Event {
    /// Make an event from its data, setting both marks to zero.
    pub(crate) fn new(data: EventData) -> Event {
        Event {
            data,
            start_mark: Mark::default(),
            end_mark: Mark::default(),
        }
    }

    /// Create the STREAM-END event.
    pub fn stream_end() -> Event {
        Event::new(EventData::StreamEnd)
    }
}
