/// Errors raised by the annotation core.
///
/// A lookup without result is not an error; it is rendered as `.` in the output.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnnoError {
    /// Wrong field count, unparsable integer, unknown chromosome, ...
    #[error("malformed input in {source_name} line {line}: {message}")]
    MalformedInput {
        source_name: String,
        line: usize,
        message: String,
    },
    /// File not found or not readable.
    #[error("missing resource {resource}: {message}")]
    MissingResource { resource: String, message: String },
    /// Reference and alternative allele are identical.
    #[error("degenerate variant {chrom}:{pos} {allele}>{allele}")]
    DegenerateVariant {
        chrom: String,
        pos: i32,
        allele: String,
    },
    /// Input to a sorted merge is not sorted.
    #[error("{what} is not sorted ascending at index {index}")]
    PreconditionViolation { what: String, index: usize },
    /// Built regions do not tile the transcript.
    #[error("regions of transcript {transcript} do not cover {tx_start}-{tx_end}: {message}")]
    InvalidRegions {
        transcript: String,
        tx_start: i32,
        tx_end: i32,
        message: String,
    },
}

impl AnnoError {
    pub fn malformed<S: Into<String>, M: Into<String>>(
        source_name: S,
        line: usize,
        message: M,
    ) -> Self {
        AnnoError::MalformedInput {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    pub fn missing<S: Into<String>, M: ToString>(resource: S, message: M) -> Self {
        AnnoError::MissingResource {
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::AnnoError;

    #[test]
    fn display_malformed() {
        let err = AnnoError::malformed("genes.txt", 3, "expected 16 columns");
        insta::assert_snapshot!(
            err.to_string(),
            @"malformed input in genes.txt line 3: expected 16 columns"
        );
    }

    #[test]
    fn display_degenerate() {
        let err = AnnoError::DegenerateVariant {
            chrom: "1".into(),
            pos: 100,
            allele: "A".into(),
        };
        insta::assert_snapshot!(err.to_string(), @"degenerate variant 1:100 A>A");
    }
}
