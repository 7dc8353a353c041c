use crate::{Encoding, Mark, ScalarStyle};

/// A token produced by the [`Scanner`](crate::Scanner).
#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub struct Token {
    /// The token kind and payload.
    pub data: TokenData,
    /// The beginning of the token.
    pub start_mark: Mark,
    /// The end of the token.
    pub end_mark: Mark,
}

/// The token alphabet.
#[derive(Debug, PartialEq)]
pub enum TokenData {
    /// STREAM-START, carrying the detected input encoding.
    StreamStart {
        /// The stream encoding.
        encoding: Encoding,
    },
    /// STREAM-END.
    StreamEnd,
    /// A `%YAML` VERSION-DIRECTIVE.
    VersionDirective {
        /// The major version number.
        major: i32,
        /// The minor version number.
        minor: i32,
    },
    /// A `%TAG` TAG-DIRECTIVE.
    TagDirective {
        /// The tag handle.
        handle: String,
        /// The tag prefix.
        prefix: String,
    },
    /// DOCUMENT-START (`---`).
    DocumentStart,
    /// DOCUMENT-END (`...`).
    DocumentEnd,
    /// BLOCK-SEQUENCE-START.
    BlockSequenceStart,
    /// BLOCK-MAPPING-START.
    BlockMappingStart,
    /// BLOCK-END.
    BlockEnd,
    /// FLOW-SEQUENCE-START (`[`).
    FlowSequenceStart,
    /// FLOW-SEQUENCE-END (`]`).
    FlowSequenceEnd,
    /// FLOW-MAPPING-START (`{`).
    FlowMappingStart,
    /// FLOW-MAPPING-END (`}`).
    FlowMappingEnd,
    /// BLOCK-ENTRY (`-`).
    BlockEntry,
    /// FLOW-ENTRY (`,`).
    FlowEntry,
    /// KEY (`?`, or retrofitted from a simple key).
    Key,
    /// VALUE (`:`).
    Value,
    /// ALIAS (`*name`).
    Alias {
        /// The alias name.
        value: String,
    },
    /// ANCHOR (`&name`).
    Anchor {
        /// The anchor name.
        value: String,
    },
    /// TAG (`!<uri>`, `!handle!suffix` or `!suffix`).
    Tag {
        /// The tag handle.
        handle: String,
        /// The tag suffix.
        suffix: String,
    },
    /// SCALAR.
    Scalar {
        /// The scalar value.
        value: String,
        /// The scalar style.
        style: ScalarStyle,
    },
}
