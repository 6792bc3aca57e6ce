//! Compiler diagnostic filtering and rewriting.
//!
//! fxc running under wine reports locations as
//! `Z:\home\dev\game\Shaders\Foo.hlsl(12,5): error X3004: ...` with zero-based
//! columns, and only uses a `a-b` range when the span is wider than one
//! character. Editors want a project-relative path and one-based, always
//! ranged columns: `Shaders/Foo.hlsl(12,6-6): error X3004: ...`.

use log::warn;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::io::Write;

/// Absolute path prefix wine gives paths from the unix root.
pub const DEFAULT_COMPAT_PREFIX: &str = "Z:\\";

/// Directory that rewritten paths are made relative to.
pub const DEFAULT_PROJECT_ROOT: &str = "Shaders/";

/// Noise dropped before rewriting.
pub const DEFAULT_DENY_LIST: [&str; 6] = [
    "fixme:font",
    "err:font",
    "warning X3571",
    "fixme:rpc",
    "err:rpc",
    // Already reported through the process exit path.
    "compilation failed",
];

/// The compiler pipe a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Filters and rewrites individual lines of compiler output.
#[derive(Debug, Clone)]
pub struct DiagnosticNormalizer {
    compat_prefix: String,
    project_root: String,
    deny_list: Vec<String>,
}

impl Default for DiagnosticNormalizer {
    fn default() -> Self {
        Self {
            compat_prefix: DEFAULT_COMPAT_PREFIX.to_string(),
            project_root: DEFAULT_PROJECT_ROOT.to_string(),
            deny_list: DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DiagnosticNormalizer {
    /// Creates a normalizer for wine's `Z:\` drive, rewriting paths to
    /// `Shaders/` and dropping the default noise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the absolute path prefix the compatibility layer puts in front
    /// of file names.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix to look for (e.g., `Z:\`); empty disables the
    ///   path rewrite
    pub fn compat_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.compat_prefix = prefix.into();
        self
    }

    /// Sets the directory rewritten paths are made relative to.
    ///
    /// # Arguments
    ///
    /// * `root` - Replacement for the stripped directory, with its trailing
    ///   separator (e.g., "Shaders/")
    pub fn project_root(mut self, root: impl Into<String>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Adds a substring that causes a line to be dropped.
    ///
    /// # Arguments
    ///
    /// * `pattern` - Text matched anywhere in the line, case-sensitively
    pub fn deny(mut self, pattern: impl Into<String>) -> Self {
        self.deny_list.push(pattern.into());
        self
    }

    /// Whether any deny-list pattern occurs in `line`.
    pub fn is_denied(&self, line: &str) -> bool {
        self.deny_list.iter().any(|pattern| line.contains(pattern.as_str()))
    }

    /// Returns the line as it should be shown, or `None` if it is noise.
    ///
    /// Diagnostics arrive on stderr and get both rewrites. Stdout carries
    /// status text such as `compilation object save succeeded; see ...`, so
    /// only its paths are rewritten.
    pub fn normalize_from(&self, stream: OutputStream, line: &str) -> Option<String> {
        match stream {
            OutputStream::Stderr => self.normalize(line),
            OutputStream::Stdout => {
                if self.is_denied(line) {
                    return None;
                }
                Some(self.rewrite_path(line).into_owned())
            }
        }
    }

    /// Filters and rewrites one diagnostic line, or returns `None` if it is
    /// noise.
    pub fn normalize(&self, line: &str) -> Option<String> {
        if self.is_denied(line) {
            return None;
        }
        let line = self.rewrite_path(line);
        Some(rewrite_columns(&line))
    }

    /// Replaces the compatibility-layer directory in front of a file name
    /// with the project root. Text before the prefix and after the final
    /// backslash of the path is kept.
    ///
    /// The path ends at its `(line,` location suffix, so parentheses in
    /// directory names and backslashes in the message are left alone.
    pub fn rewrite_path<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if self.compat_prefix.is_empty() {
            return Cow::Borrowed(line);
        }
        let Some(start) = line.find(self.compat_prefix.as_str()) else {
            return Cow::Borrowed(line);
        };
        let path_end = start + location_start(&line[start..]).unwrap_or(line.len() - start);
        let Some(sep) = line[start..path_end].rfind('\\') else {
            return Cow::Borrowed(line);
        };
        let file = &line[start + sep + 1..];
        Cow::Owned(format!("{}{}{}", &line[..start], self.project_root, file))
    }
}

/// Byte offset of the first `(` that opens a `(<digits>,` location.
fn location_start(text: &str) -> Option<usize> {
    text.match_indices('(').map(|(i, _)| i).find(|&i| {
        let rest = &text[i + 1..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        digits > 0 && rest[digits..].starts_with(',')
    })
}

/// Converts the `line,col` or `line,col-col` location after the first comma
/// into a one-based `a-b` range. Lines that do not have that shape are
/// returned unchanged.
pub fn rewrite_columns(line: &str) -> String {
    let Some(comma) = line.find(',') else {
        warn!("no location in diagnostic: {line}");
        return line.to_string();
    };
    let rest = &line[comma + 1..];
    let Some(close) = rest.find(')') else {
        return line.to_string();
    };

    let columns = &rest[..close];
    let range = match columns.split_once('-') {
        None => match columns.trim().parse::<u32>() {
            Ok(col) => {
                let col = col.saturating_add(1);
                format!("{col}-{col}")
            }
            Err(_) => return line.to_string(),
        },
        Some((first, last)) => match (first.trim().parse::<u32>(), last.trim().parse::<u32>()) {
            (Ok(first), Ok(last)) => {
                format!("{}-{}", first.saturating_add(1), last.saturating_add(1))
            }
            _ => return line.to_string(),
        },
    };

    format!("{}{}{}", &line[..=comma], range, &rest[close..])
}

/// Destination for normalized compiler output.
///
/// `emit` is called concurrently from every worker and must write each line
/// whole.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes each line to a shared writer, one line per lock.
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stderr> {
    /// Sink writing to the process's standard error.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Wraps a writer.
    ///
    /// # Arguments
    ///
    /// * `out` - Destination for every emitted line, each followed by `\n`
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> DiagnosticSink for ConsoleSink<W> {
    fn emit(&self, line: &str) {
        let mut out = self.out.lock();
        // Nothing sensible to do if the console is gone.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

/// Collects emitted lines in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line emitted so far, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINE_ERROR: &str =
        "Z:\\home\\dev\\game\\Shaders\\Static.hlsl(12,5): error X3004: undeclared identifier 'foo'";

    #[test]
    fn single_column_becomes_one_based_range() {
        let out = rewrite_columns("Shaders/Static.hlsl(12,5): error X3004: oops");
        assert_eq!(out, "Shaders/Static.hlsl(12,6-6): error X3004: oops");
    }

    #[test]
    fn column_range_is_shifted() {
        let out = rewrite_columns("Shaders/Static.hlsl(40,3-7): warning X3206: truncation");
        assert!(out.contains(",4-8)"));
        assert_eq!(out, "Shaders/Static.hlsl(40,4-8): warning X3206: truncation");
    }

    #[test]
    fn line_without_comma_is_untouched() {
        let line = "compilation object save succeeded; see CompiledShaders/SM5/VS/A.cso";
        assert_eq!(rewrite_columns(line), line);
    }

    #[test]
    fn malformed_columns_are_untouched() {
        for line in [
            "Shaders/A.hlsl(3,x): error",
            "Shaders/A.hlsl(3,1-y): error",
            "error: a, b and c",
            "Shaders/A.hlsl(3,): error",
        ] {
            assert_eq!(rewrite_columns(line), line);
        }
    }

    #[test]
    fn wine_path_is_made_project_relative() {
        let normalizer = DiagnosticNormalizer::new();
        assert_eq!(
            normalizer.rewrite_path(WINE_ERROR),
            "Shaders/Static.hlsl(12,5): error X3004: undeclared identifier 'foo'"
        );
    }

    #[test]
    fn path_without_prefix_is_untouched() {
        let normalizer = DiagnosticNormalizer::new();
        let line = "Shaders/Static.hlsl(12,5): error X3004: x";
        assert!(matches!(normalizer.rewrite_path(line), Cow::Borrowed(l) if l == line));
    }

    #[test]
    fn backslashes_after_location_are_not_path_separators() {
        let normalizer = DiagnosticNormalizer::new();
        let line = "Z:\\src\\Shaders\\Post.hlsl(1,1): error X1000: bad escape '\\q'";
        assert_eq!(
            normalizer.rewrite_path(line),
            "Shaders/Post.hlsl(1,1): error X1000: bad escape '\\q'"
        );
    }

    #[test]
    fn parentheses_in_directory_names_stay_inside_the_path() {
        let normalizer = DiagnosticNormalizer::new();
        let line = "Z:\\home\\me\\proj (old)\\Shaders\\A.hlsl(1,2): error X3000: call f(3,4)";
        assert_eq!(
            normalizer.rewrite_path(line),
            "Shaders/A.hlsl(1,2): error X3000: call f(3,4)"
        );
        assert_eq!(
            normalizer.normalize(line).as_deref(),
            Some("Shaders/A.hlsl(1,3-3): error X3000: call f(3,4)")
        );
    }

    #[test]
    fn path_without_location_is_rewritten_to_its_file_name() {
        let normalizer = DiagnosticNormalizer::new();
        assert_eq!(
            normalizer.rewrite_path("error X1507: failed to open source file: 'Z:\\src (2)\\Shaders\\Missing.hlsl'"),
            "error X1507: failed to open source file: 'Shaders/Missing.hlsl'"
        );
    }

    #[test]
    fn stdout_lines_keep_their_columns() {
        let normalizer = DiagnosticNormalizer::new();
        let saved = "compilation object save succeeded; see Z:\\home\\dev\\CompiledShaders\\SM5\\VS\\A.cso";
        assert_eq!(
            normalizer.normalize_from(OutputStream::Stdout, saved).as_deref(),
            Some("compilation object save succeeded; see Shaders/A.cso")
        );
        assert_eq!(
            normalizer.normalize_from(OutputStream::Stdout, "Shaders/A.hlsl(3,4): note").as_deref(),
            Some("Shaders/A.hlsl(3,4): note")
        );
        assert_eq!(
            normalizer.normalize_from(OutputStream::Stderr, "Shaders/A.hlsl(3,4): note").as_deref(),
            Some("Shaders/A.hlsl(3,5-5): note")
        );
        assert_eq!(normalizer.normalize_from(OutputStream::Stdout, "0009:fixme:rpc:x"), None);
    }

    #[test]
    fn normalize_applies_both_rewrites() {
        let normalizer = DiagnosticNormalizer::new();
        assert_eq!(
            normalizer.normalize(WINE_ERROR).as_deref(),
            Some("Shaders/Static.hlsl(12,6-6): error X3004: undeclared identifier 'foo'")
        );
    }

    #[test]
    fn denied_lines_are_dropped_wherever_the_pattern_occurs() {
        let normalizer = DiagnosticNormalizer::new().deny("X4000");
        for line in [
            "0024:fixme:font:get_name_record_codepage encoding 20 not supported",
            "0009:err:rpc:I_RpcReceive we got fault packet",
            "Z:\\x\\Shaders\\A.hlsl(3,9): warning X3571: pow(f, e) will not work for negative f",
            "compilation failed; no code produced",
            "Shaders/A.hlsl(1,1): warning X4000: use of potentially uninitialized variable",
        ] {
            assert_eq!(normalizer.normalize(line), None, "{line}");
        }
        assert!(normalizer.normalize("compilation succeeded").is_some());
    }

    #[test]
    fn custom_prefix_and_root() {
        let normalizer = DiagnosticNormalizer::new()
            .compat_prefix("C:\\build\\")
            .project_root("src/shaders/");
        assert_eq!(
            normalizer.normalize("C:\\build\\hlsl\\Sky.hlsl(2,0-3): error X3000: syntax"),
            Some("src/shaders/Sky.hlsl(2,1-4): error X3000: syntax".to_string())
        );
    }

    #[test]
    fn console_sink_writes_whole_lines() {
        let sink = ConsoleSink::new(Vec::new());
        sink.emit("first");
        sink.emit("second");
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "first\nsecond\n");
    }
}
