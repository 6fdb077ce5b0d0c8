//! Boundary-aware recursive text splitting.
//!
//! A [`SplitRule`] maps a file extension to an ordered list of separator
//! preferences: declaration markers first, then blank lines, newlines,
//! spaces, and finally character-level splitting as the last resort.
//! [`split_text`] applies the separators recursively so every produced
//! piece stays within the target chunk size, with a configurable overlap
//! carried between consecutive pieces.
//!
//! Separators are kept attached to the start of the following piece, so
//! every emitted piece is an exact substring of the input. The chunker
//! relies on that to remap pieces back to source lines.

/// Ordered separator preferences plus sizing for one file type.
///
/// Sizes are in `char` counts, not bytes.
#[derive(Debug, Clone)]
pub struct SplitRule {
    pub separators: &'static [&'static str],
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Generic fallback: blank line, newline, space, character.
const GENERIC_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Return the splitting rule for a file extension (leading dot optional,
/// case-insensitive). Unknown extensions fall back to the generic rule.
#[must_use]
pub fn rule_for_extension(extension: &str, chunk_size: usize, chunk_overlap: usize) -> SplitRule {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();

    let separators: &'static [&'static str] = match ext.as_str() {
        "py" => &[
            "\nclass ", "\ndef ", "\n\tdef ", "\n\n", "\n", " ", "",
        ],
        "js" | "jsx" => &[
            "\nfunction ", "\nconst ", "\nlet ", "\nvar ", "\nclass ", "\nif ", "\nfor ",
            "\nwhile ", "\nswitch ", "\ncase ", "\ndefault ", "\n\n", "\n", " ", "",
        ],
        "ts" | "tsx" => &[
            "\nenum ", "\ninterface ", "\nnamespace ", "\ntype ", "\nclass ", "\nfunction ",
            "\nconst ", "\nlet ", "\nvar ", "\nif ", "\nfor ", "\nwhile ", "\nswitch ",
            "\ncase ", "\ndefault ", "\n\n", "\n", " ", "",
        ],
        "java" => &[
            "\nclass ", "\npublic ", "\nprotected ", "\nprivate ", "\nstatic ", "\nif ",
            "\nfor ", "\nwhile ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
        ],
        "c" | "h" | "cpp" | "hpp" | "cc" => &[
            "\nclass ", "\nvoid ", "\nint ", "\nfloat ", "\ndouble ", "\nif ", "\nfor ",
            "\nwhile ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
        ],
        "cs" => &[
            "\ninterface ", "\nenum ", "\nclass ", "\npublic ", "\nprotected ", "\nprivate ",
            "\nstatic ", "\nif ", "\nfor ", "\nforeach ", "\nwhile ", "\nswitch ", "\ncase ",
            "\n\n", "\n", " ", "",
        ],
        "go" => &[
            "\nfunc ", "\nvar ", "\nconst ", "\ntype ", "\nif ", "\nfor ", "\nswitch ",
            "\ncase ", "\n\n", "\n", " ", "",
        ],
        "rs" => &[
            "\nfn ", "\nconst ", "\nlet ", "\nif ", "\nwhile ", "\nfor ", "\nloop ",
            "\nmatch ", "\n\n", "\n", " ", "",
        ],
        "php" => &[
            "\nfunction ", "\nclass ", "\nif ", "\nforeach ", "\nwhile ", "\ndo ",
            "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
        ],
        "rb" => &[
            "\ndef ", "\nclass ", "\nif ", "\nunless ", "\nwhile ", "\nfor ", "\ndo ",
            "\nbegin ", "\nrescue ", "\n\n", "\n", " ", "",
        ],
        "swift" => &[
            "\nfunc ", "\nclass ", "\nstruct ", "\nenum ", "\nif ", "\nfor ", "\nwhile ",
            "\ndo ", "\nswitch ", "\ncase ", "\n\n", "\n", " ", "",
        ],
        "kt" => &[
            "\nclass ", "\nfun ", "\nval ", "\nvar ", "\nif ", "\nfor ", "\nwhile ",
            "\nwhen ", "\nelse ", "\n\n", "\n", " ", "",
        ],
        "scala" => &[
            "\nclass ", "\nobject ", "\ndef ", "\nval ", "\nvar ", "\nif ", "\nfor ",
            "\nwhile ", "\nmatch ", "\ncase ", "\n\n", "\n", " ", "",
        ],
        "md" | "markdown" => &[
            "\n# ", "\n## ", "\n### ", "\n#### ", "\n\n", "\n", " ", "",
        ],
        "html" | "htm" => &[
            "<body", "<div", "<p", "<br", "<li", "<h1", "<h2", "<h3", "<span", "<table",
            "<tr", "<td", "<ul", "<ol", "\n\n", "\n", " ", "",
        ],
        _ => GENERIC_SEPARATORS,
    };

    SplitRule {
        separators,
        chunk_size,
        chunk_overlap,
    }
}

/// Split `text` into pieces no larger than `rule.chunk_size` characters,
/// overlapping by `rule.chunk_overlap`, preferring the rule's separators in
/// order. Pieces are trimmed; whitespace-only pieces are dropped.
#[must_use]
pub fn split_text(text: &str, rule: &SplitRule) -> Vec<String> {
    split_with_separators(text, rule.separators, rule.chunk_size, rule.chunk_overlap)
}

/// One level of the recursion: split on the highest-priority separator that
/// occurs in `text`, merge small fragments, recurse into oversized ones with
/// the remaining separators.
fn split_with_separators(
    text: &str,
    separators: &[&'static str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let (separator, remaining) = pick_separator(text, separators);
    let fragments = split_keeping_separator(text, separator);

    let mut chunks = Vec::new();
    let mut good: Vec<&str> = Vec::new();

    for fragment in fragments {
        if fragment.chars().count() < chunk_size {
            good.push(fragment);
        } else {
            if !good.is_empty() {
                merge_fragments(&good, chunk_size, chunk_overlap, &mut chunks);
                good.clear();
            }
            if remaining.is_empty() {
                // No finer separator left; emit oversized as-is
                chunks.push(fragment.to_string());
            } else {
                chunks.extend(split_with_separators(
                    fragment,
                    remaining,
                    chunk_size,
                    chunk_overlap,
                ));
            }
        }
    }

    if !good.is_empty() {
        merge_fragments(&good, chunk_size, chunk_overlap, &mut chunks);
    }

    chunks
}

/// First separator present in `text`; the empty string always matches.
/// Returns the chosen separator and the lower-priority remainder.
fn pick_separator<'a>(
    text: &str,
    separators: &'a [&'static str],
) -> (&'static str, &'a [&'static str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split `text` at every occurrence of `separator`, keeping the separator
/// attached to the start of the following fragment. An empty separator
/// splits into single characters. Fragments are contiguous substrings of
/// `text`, so concatenating adjacent fragments reproduces the source.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut boundaries = vec![0];
    for (idx, _) in text.match_indices(separator) {
        if idx > 0 {
            boundaries.push(idx);
        }
    }
    boundaries.push(text.len());

    boundaries
        .windows(2)
        .map(|w| &text[w[0]..w[1]])
        .filter(|s| !s.is_empty())
        .collect()
}

/// Greedily merge adjacent fragments into chunks up to `chunk_size`
/// characters, carrying roughly `chunk_overlap` characters of trailing
/// fragments into the next chunk.
fn merge_fragments(
    fragments: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
    out: &mut Vec<String>,
) {
    let mut window: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
    let mut total = 0usize;

    for fragment in fragments {
        let len = fragment.chars().count();

        if total + len > chunk_size && !window.is_empty() {
            push_joined(&window, out);

            // Slide the window: keep at most `chunk_overlap` characters,
            // and make room for the incoming fragment
            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                let dropped = window.pop_front().map_or(0, |f| f.chars().count());
                total -= dropped;
            }
        }

        window.push_back(fragment);
        total += len;
    }

    push_joined(&window, out);
}

/// Join a fragment window into one trimmed chunk; whitespace-only windows
/// produce nothing.
fn push_joined(window: &std::collections::VecDeque<&str>, out: &mut Vec<String>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
