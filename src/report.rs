use logotrace::{DecodeError, RasterFormat, VectorizeError};

pub fn report_error(err: &VectorizeError) {
    eprintln!("Error: {err}");
    match err {
        VectorizeError::SizeLimit(_) => {
            eprintln!();
            eprintln!("Raise the limit with --max-bytes <N>");
            eprintln!(
                "  - Or set environment variable {} to the new limit",
                logotrace::ENV_MAX_BYTES
            );
        }
        VectorizeError::Decode(DecodeError::UnsupportedFormat { .. }) => {
            let supported: Vec<String> = RasterFormat::ALL.iter().map(ToString::to_string).collect();
            eprintln!();
            eprintln!("Supported formats: {}", supported.join(", "));
        }
        VectorizeError::Decode(DecodeError::LimitsExceeded(_)) => {
            eprintln!();
            eprintln!("Raise the decoded size cap with --max-dimension <N>");
        }
        VectorizeError::Tracing(logotrace::TracingError::Timeout { .. }) => {
            eprintln!();
            eprintln!("Try a larger --timeout, fewer --colors or a higher --path-omit");
        }
        VectorizeError::Profile { .. } => {
            eprintln!();
            eprintln!("Profiles are JSON objects with TracingConfig fields, e.g. {{\"color_count\": 8}}");
        }
        _ => {}
    }
}
