//! Wordlist loading
//!
//! Memory-maps the input file, detects its encoding and yields trimmed,
//! non-empty words. Bytes that are invalid in the detected encoding are a
//! hard error: a blacklist built from a lossy decode would silently miss
//! entries.

use chardetng::EncodingDetector;
use encoding_rs::{DecoderResult, Encoding};
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Errors raised while loading a wordlist
#[derive(Debug, thiserror::Error)]
pub enum WordlistError {
    #[error("failed to open wordlist {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to map wordlist {path:?} into memory")]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line} is not valid {encoding}")]
    MalformedLine { line: u64, encoding: &'static str },
}

/// Result of encoding detection
#[derive(Debug, Clone)]
pub struct EncodingInfo {
    /// Detected encoding name
    pub name: &'static str,
    /// The encoding_rs Encoding reference
    pub encoding: &'static Encoding,
    /// Length of the byte order mark to skip, if one was found
    pub bom_len: usize,
}

impl Default for EncodingInfo {
    fn default() -> Self {
        Self {
            name: "UTF-8",
            encoding: encoding_rs::UTF_8,
            bom_len: 0,
        }
    }
}

/// Detect the encoding of wordlist content
///
/// Content without a byte order mark is UTF-8 only if all of it validates;
/// a single legacy byte anywhere in the file sends the whole buffer through
/// chardetng.
pub fn detect_encoding(content: &[u8]) -> EncodingInfo {
    if content.is_empty() {
        return EncodingInfo::default();
    }

    if let Some((encoding, bom_len)) = Encoding::for_bom(content) {
        return EncodingInfo {
            name: encoding.name(),
            encoding,
            bom_len,
        };
    }

    if std::str::from_utf8(content).is_ok() {
        return EncodingInfo::default();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(content, true);
    let encoding = detector.guess(None, true);

    EncodingInfo {
        name: encoding.name(),
        encoding,
        bom_len: 0,
    }
}

/// Words read from a wordlist, in input order
#[derive(Debug, Default)]
pub struct Wordlist {
    /// Trimmed, non-empty words
    pub words: Vec<String>,
    /// Name of the encoding the input was decoded with
    pub encoding: &'static str,
    /// Lines seen, blank ones included
    pub lines: u64,
    /// Lines that were empty after trimming
    pub blank_lines: u64,
    /// Size of the input in bytes
    pub bytes: u64,
}

impl Wordlist {
    fn new(encoding: &'static str, bytes: u64) -> Self {
        Self {
            encoding,
            bytes,
            ..Default::default()
        }
    }

    fn push_line(&mut self, line: &str) {
        self.lines += 1;
        let word = line.trim();
        if word.is_empty() {
            self.blank_lines += 1;
        } else {
            self.words.push(word.to_string());
        }
    }
}

/// Load a wordlist file into memory
pub fn load_words(path: &Path) -> Result<Wordlist, WordlistError> {
    let file = File::open(path).map_err(|source| WordlistError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let len = file
        .metadata()
        .map_err(|source| WordlistError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    if len == 0 {
        log::debug!("Wordlist {:?} is empty", path);
        return Ok(Wordlist::new(EncodingInfo::default().name, 0));
    }

    // The file is opened read-only and not modified while mapped
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| WordlistError::Map {
        path: path.to_path_buf(),
        source,
    })?;

    parse_words(&mmap)
}

/// Decode raw wordlist content and split it into words
pub fn parse_words(content: &[u8]) -> Result<Wordlist, WordlistError> {
    let info = detect_encoding(content);
    log::debug!("Detected wordlist encoding: {}", info.name);

    let body = &content[info.bom_len..];
    let mut wordlist = Wordlist::new(info.name, content.len() as u64);

    if info.encoding == encoding_rs::UTF_8 {
        for (idx, range) in LineSplitter::new(body).enumerate() {
            let line =
                std::str::from_utf8(&body[range]).map_err(|_| WordlistError::MalformedLine {
                    line: idx as u64 + 1,
                    encoding: info.name,
                })?;
            wordlist.push_line(line);
        }
    } else if info.encoding.is_ascii_compatible() {
        // 0x0A and 0x0D are always line breaks in ASCII-compatible encodings
        for (idx, range) in LineSplitter::new(body).enumerate() {
            let line = info
                .encoding
                .decode_without_bom_handling_and_without_replacement(&body[range])
                .ok_or(WordlistError::MalformedLine {
                    line: idx as u64 + 1,
                    encoding: info.name,
                })?;
            wordlist.push_line(&line);
        }
    } else {
        let decoded = decode_whole(info.encoding, body)?;
        for range in LineSplitter::new(decoded.as_bytes()) {
            // Line breaks are ASCII, so ranges fall on char boundaries
            wordlist.push_line(&decoded[range]);
        }
    }

    log::debug!(
        "Read {} lines ({} blank) from {} bytes",
        wordlist.lines,
        wordlist.blank_lines,
        wordlist.bytes
    );

    Ok(wordlist)
}

/// Decode a buffer in an encoding whose line breaks are not single bytes
///
/// On malformed input the error names the line of the first bad sequence.
fn decode_whole(encoding: &'static Encoding, body: &[u8]) -> Result<String, WordlistError> {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut decoded = String::with_capacity(body.len() + 16);
    let mut read = 0;

    loop {
        let (result, consumed) =
            decoder.decode_to_string_without_replacement(&body[read..], &mut decoded, true);
        read += consumed;

        match result {
            DecoderResult::InputEmpty => return Ok(decoded),
            DecoderResult::OutputFull => decoded.reserve((body.len() - read) * 2 + 16),
            DecoderResult::Malformed(_, _) => {
                return Err(WordlistError::MalformedLine {
                    line: line_of_next_char(&decoded),
                    encoding: encoding.name(),
                })
            }
        }
    }
}

/// 1-based line number of the character that would follow `text`
fn line_of_next_char(text: &str) -> u64 {
    let complete = LineSplitter::new(text.as_bytes()).count() as u64;
    match text.as_bytes().last() {
        None | Some(b'\n') | Some(b'\r') => complete + 1,
        Some(_) => complete,
    }
}

/// Splits a byte buffer into line ranges on `\n`, `\r\n` or a lone `\r`
struct LineSplitter<'a> {
    content: &'a [u8],
    position: usize,
}

impl<'a> LineSplitter<'a> {
    fn new(content: &'a [u8]) -> Self {
        Self {
            content,
            position: 0,
        }
    }
}

impl<'a> Iterator for LineSplitter<'a> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.content.len() {
            return None;
        }

        let start = self.position;
        let remaining = &self.content[start..];

        let Some(i) = memchr::memchr2(b'\n', b'\r', remaining) else {
            self.position = self.content.len();
            return Some(start..self.content.len());
        };

        let crlf = remaining[i] == b'\r' && remaining.get(i + 1) == Some(&b'\n');
        self.position = start + i + if crlf { 2 } else { 1 };
        Some(start..start + i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_utf8_detection() {
        let info = detect_encoding("Hello, World!\nПривет мир!\n".as_bytes());
        assert_eq!(info.name, "UTF-8");
        assert_eq!(info.bom_len, 0);
    }

    #[test]
    fn test_bom_detection() {
        let info = detect_encoding(&[0xEF, 0xBB, 0xBF, b'a']);
        assert_eq!(info.name, "UTF-8");
        assert_eq!(info.bom_len, 3);

        let info = detect_encoding(&[0xFF, 0xFE, b'a', 0x00]);
        assert_eq!(info.name, "UTF-16LE");
        assert_eq!(info.bom_len, 2);
    }

    #[test]
    fn test_trims_and_skips_blank_lines() {
        let wordlist = parse_words(b"  cat \n\n\t\ncar\r\ndog").unwrap();

        assert_eq!(wordlist.words, vec!["cat", "car", "dog"]);
        assert_eq!(wordlist.lines, 5);
        assert_eq!(wordlist.blank_lines, 2);
    }

    #[test]
    fn test_keeps_duplicates() {
        let wordlist = parse_words(b"password\npassword\n").unwrap();
        assert_eq!(wordlist.words, vec!["password", "password"]);
    }

    #[test]
    fn test_utf8_bom_is_skipped() {
        let wordlist = parse_words(b"\xEF\xBB\xBFalpha\nbeta\n").unwrap();
        assert_eq!(wordlist.words, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut content = vec![0xFF, 0xFE];
        for unit in "héllo\r\nwörld\n".encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }

        let wordlist = parse_words(&content).unwrap();
        assert_eq!(wordlist.encoding, "UTF-16LE");
        assert_eq!(wordlist.words, vec!["héllo", "wörld"]);
    }

    #[test]
    fn test_utf16le_malformed_reports_line() {
        let mut content = vec![0xFF, 0xFE];
        for unit in "alpha\nbeta".encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }
        // Unpaired high surrogate in the middle of line 2
        content.extend_from_slice(&0xD800u16.to_le_bytes());
        for unit in "x\ngamma\n".encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }

        let err = parse_words(&content).unwrap_err();
        assert!(
            matches!(
                err,
                WordlistError::MalformedLine {
                    line: 2,
                    encoding: "UTF-16LE"
                }
            ),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_utf16le_malformed_at_line_start() {
        let mut content = vec![0xFF, 0xFE];
        for unit in "one\r\ntwo\r\n".encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }
        content.extend_from_slice(&0xDC00u16.to_le_bytes());

        let err = parse_words(&content).unwrap_err();
        assert!(matches!(err, WordlistError::MalformedLine { line: 3, .. }));
    }

    #[test]
    fn test_legacy_bytes_past_first_64k() {
        let mut content = Vec::new();
        while content.len() <= 64 * 1024 {
            content.extend_from_slice(b"password\n");
        }
        content.extend_from_slice(b"caf\xE9\nna\xEFve\n");

        assert_ne!(detect_encoding(&content).name, "UTF-8");

        let wordlist = parse_words(&content).unwrap();
        let tail = &wordlist.words[wordlist.words.len() - 2..];
        assert_eq!(tail, ["café", "naïve"]);
    }

    #[test]
    fn test_lone_carriage_return_breaks_lines() {
        let wordlist = parse_words(b"cat\rcar\r\ndog").unwrap();
        assert_eq!(wordlist.words, vec!["cat", "car", "dog"]);
        assert_eq!(wordlist.lines, 3);
        assert_eq!(wordlist.blank_lines, 0);
    }

    #[test]
    fn test_line_splitter_ranges() {
        let content = b"a\r\rb\n\r\nc\r";
        let lines: Vec<&[u8]> = LineSplitter::new(content)
            .map(|range| &content[range])
            .collect();
        assert_eq!(lines, vec![&b"a"[..], b"", b"b", b"", b"c"]);
    }

    #[test]
    fn test_malformed_utf8_after_bom_is_fatal() {
        let err = parse_words(b"\xEF\xBB\xBFgood\nba\xFFd\n").unwrap_err();
        assert!(matches!(err, WordlistError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_load_words_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "line1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "line2").unwrap();

        let wordlist = load_words(file.path()).unwrap();
        assert_eq!(wordlist.words, vec!["line1", "line2"]);
        assert_eq!(wordlist.bytes, 13);
    }

    #[test]
    fn test_load_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let wordlist = load_words(file.path()).unwrap();
        assert!(wordlist.words.is_empty());
        assert_eq!(wordlist.lines, 0);
    }

    #[test]
    fn test_missing_file() {
        let err = load_words(Path::new("/nonexistent/wordlist.txt")).unwrap_err();
        assert!(matches!(err, WordlistError::Open { .. }));
    }
}
