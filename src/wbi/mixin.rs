/// Byte positions picked from `img_key + sub_key` to build the mixin key.
pub const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25,
    54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

pub const MIXIN_KEY_LEN: usize = 32;

/// The two raw key fragments served by the nav endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPair {
    pub img_key: String,
    pub sub_key: String,
}

impl KeyPair {
    pub fn new(img_key: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            img_key: img_key.into(),
            sub_key: sub_key.into(),
        }
    }

    pub fn mixin_key(&self) -> String {
        mixin_key(&format!("{}{}", self.img_key, self.sub_key))
    }
}

/// Permute `orig` through [`MIXIN_KEY_ENC_TAB`], keeping at most 32 characters.
///
/// Positions past the end of `orig` are skipped, so short inputs give short keys. Real key
/// fragments are 32 hex characters each, which always yields the full 32.
pub fn mixin_key(orig: &str) -> String {
    let bytes = orig.as_bytes();
    MIXIN_KEY_ENC_TAB
        .iter()
        .filter_map(|&i| bytes.get(i))
        .take(MIXIN_KEY_LEN)
        .map(|&b| char::from(b))
        .collect()
}
