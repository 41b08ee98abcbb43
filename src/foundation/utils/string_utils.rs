use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|.]"#).expect("static regex"));

/// Turns an artist, album or track name into something usable as a file name.
///
/// The name is NFC normalized so that visually identical names land on the same
/// path, then every character that is reserved on common filesystems (and the
/// dot, so that the caller controls the extension) is replaced with `_`.
///
/// # Examples
///
/// ```
/// use funnytunes::foundation::utils::safe_file_name;
///
/// assert_eq!(safe_file_name("AC/DC"), "AC_DC");
/// assert_eq!(safe_file_name("Mr. Brightside?"), "Mr_ Brightside_");
/// ```
pub fn safe_file_name(name: &str) -> String {
    let normalized: String = name.nfc().collect();
    UNSAFE_FILE_CHARS
        .replace_all(&normalized, "_")
        .into_owned()
}

/// Extracts the file extension from an image URL.
///
/// Query strings and fragments are ignored. URLs whose last path segment has no
/// extension fall back to `jpg`.
///
/// # Examples
///
/// ```
/// use funnytunes::foundation::utils::image_extension;
///
/// assert_eq!(image_extension("https://img.example/a/b/cover.png?size=300"), "png");
/// assert_eq!(image_extension("https://img.example/a/b/noext"), "jpg");
/// ```
pub fn image_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = path.rsplit('/').next().unwrap_or(path);

    match last_segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => "jpg".to_string(),
    }
}

/// Counts user-perceived characters rather than bytes or code points.
pub fn display_width(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Keeps items from the front of `items` while the running character total
/// stays within `budget`.
///
/// Once an item would push the total over the budget, it and everything after it
/// are dropped. The input is never modified.
///
/// # Examples
///
/// ```
/// use funnytunes::foundation::utils::fit_to_budget;
///
/// let tags = vec!["rock".to_string(), "indie".to_string(), "alternative rock".to_string()];
/// assert_eq!(fit_to_budget(&tags, 12), vec!["rock", "indie"]);
/// ```
pub fn fit_to_budget<S: AsRef<str>>(items: &[S], budget: usize) -> Vec<String> {
    items
        .iter()
        .scan(0usize, |total, item| {
            *total += display_width(item.as_ref());
            (*total <= budget).then(|| item.as_ref().to_string())
        })
        .collect()
}
