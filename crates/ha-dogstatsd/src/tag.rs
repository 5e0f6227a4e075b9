/// A group of `key:value` tags, kept pre-joined as wire bytes.
///
/// Tags append in insertion order and are never deduplicated.
#[derive(Debug, Clone, Default)]
pub struct TagGroup {
    buf: Vec<u8>,
}

impl TagGroup {
    pub fn add_tag<T: AsRef<str>>(&mut self, key: &str, value: T) {
        if !self.buf.is_empty() {
            self.buf.push(b',');
        }
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(b':');
        self.buf.extend_from_slice(value.as_ref().as_bytes());
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }
}
