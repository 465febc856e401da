//! Buckets: service-side byte arrays used to pass strings and other variable-length data
//! through the common `*Bucket*` commands.

use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bucket {
    data: Vec<u8>,
}

impl Bucket {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Resizes the bucket; new bytes are zero.
    pub fn set_size(&mut self, size: usize) {
        self.data.resize(size, 0);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copies `src` to `offset`. Returns `false` if the write would not fit.
    pub fn set_data(&mut self, offset: usize, src: &[u8]) -> bool {
        let Some(end) = offset.checked_add(src.len()) else {
            return false;
        };
        match self.data.get_mut(offset..end) {
            Some(dst) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    pub fn get_data(&self, offset: usize, size: usize) -> Option<&[u8]> {
        self.data.get(offset..offset.checked_add(size)?)
    }

    /// Stores `s` followed by a NUL, so that an empty string differs from an empty bucket.
    pub fn set_from_string(&mut self, s: &str) {
        self.data.clear();
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
    }

    /// Reads the bucket as a string, dropping one trailing NUL. `None` if the bucket is empty
    /// or not UTF-8.
    pub fn get_as_string(&self) -> Option<String> {
        let bytes = match self.data.split_last()? {
            (0, rest) => rest,
            _ => &self.data[..],
        };
        String::from_utf8(bytes.to_vec()).ok()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketMap {
    buckets: BTreeMap<u32, Bucket>,
}

impl BucketMap {
    pub fn get(&self, id: u32) -> Option<&Bucket> {
        self.buckets.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Bucket> {
        self.buckets.get_mut(&id)
    }

    pub fn create(&mut self, id: u32) -> &mut Bucket {
        self.buckets.entry(id).or_default()
    }

    pub fn remove(&mut self, id: u32) -> Option<Bucket> {
        self.buckets.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip_strips_one_nul() {
        let mut b = Bucket::default();
        b.set_from_string("test_category");
        assert_eq!(b.size(), 14);
        assert_eq!(b.get_as_string().as_deref(), Some("test_category"));

        b.set_from_string("");
        assert_eq!(b.get_as_string().as_deref(), Some(""));

        b.set_size(0);
        assert_eq!(b.get_as_string(), None);
    }

    #[test]
    fn writes_must_fit() {
        let mut b = Bucket::default();
        b.set_size(4);
        assert!(b.set_data(2, b"ab"));
        assert!(!b.set_data(3, b"ab"));
        assert!(!b.set_data(usize::MAX, b"a"));
        assert_eq!(b.data(), b"\0\0ab");
        assert_eq!(b.get_data(1, 3), Some(&b"\0ab"[..]));
        assert_eq!(b.get_data(4, 1), None);
    }
}
