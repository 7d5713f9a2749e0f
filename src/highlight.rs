/// Wraps the first vocabulary word found in `target` in `<u>` tags.
///
/// Words are tried in list order and the scan stops at the first one that
/// occurs anywhere in the sentence; only that word's first occurrence is
/// wrapped. Matching is plain substring search, so "data" also matches
/// inside "database". Empty entries are skipped.
pub fn underline_vocab<S: AsRef<str>>(target: &str, vocabs: &[S]) -> String {
    for vocab in vocabs.iter().map(AsRef::as_ref) {
        if vocab.is_empty() {
            continue;
        }
        if let Some(start) = target.find(vocab) {
            let end = start + vocab.len();
            return format!("{}<u>{}</u>{}", &target[..start], vocab, &target[end..]);
        }
    }
    target.to_string()
}
