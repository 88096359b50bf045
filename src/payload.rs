use crate::error::ReplyError;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::{borrow::Cow, io::Read, path::Path};

const PROMPT_PREAMBLE: &str = "You are an AI assistant that analyzes text conversations from images and generates appropriate replies.

Instructions:
1. Carefully read and understand the conversation context from the image
2. Identify the last message that needs a response
3. Generate a contextually appropriate reply in the specified tone
4. Keep the response natural and conversational
5. Match the communication style of the conversation
";

const PROMPT_CLOSING: &str = "Please provide only the reply message, nothing else.";

/// Registered tone clauses, in the order the UI lists them.
const TONE_INSTRUCTIONS: &[(&str, &str)] = &[
    ("excited", "Respond with high energy, enthusiasm, and exclamation marks!"),
    ("happy", "Respond with positivity, warmth, and cheerfulness."),
    ("sad", "Respond with empathy, understanding, and gentle support."),
    ("romantic", "Respond with affection, sweetness, and romantic undertones."),
    ("casual", "Respond in a relaxed, informal, and friendly manner."),
    ("professional", "Respond formally and professionally."),
    ("funny", "Respond with humor, wit, and playfulness."),
    ("supportive", "Respond with encouragement and emotional support."),
    ("sarcastic", "Respond with subtle sarcasm and wit."),
    ("caring", "Respond with genuine care and concern."),
];

/// The predefined tone labels.
pub const SUPPORTED_TONES: [&str; 10] = [
    "excited",
    "happy",
    "sad",
    "romantic",
    "casual",
    "professional",
    "funny",
    "supportive",
    "sarcastic",
    "caring",
];

/// Image formats accepted for upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeType {
    Jpeg,
    Png,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
        }
    }

    /// Detects the format from a file name extension (`jpg`, `jpeg`, `png`).
    pub fn from_filename(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" => Some(MimeType::Jpeg),
            "png" => Some(MimeType::Png),
            _ => None,
        }
    }

    /// Detects the format from a declared content type such as `image/png`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(MimeType::Jpeg),
            "image/png" => Some(MimeType::Png),
            _ => None,
        }
    }
}

/// Raw bytes of one uploaded image.
#[derive(Clone, Debug)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime_type: MimeType,
}

/// Base64 form of an image, ready to be embedded in a request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: MimeType,
    pub data: String,
}

impl InlineImage {
    pub fn jpeg(data: impl Into<String>) -> Self {
        Self {
            mime_type: MimeType::Jpeg,
            data: data.into(),
        }
    }
}

impl ImageAsset {
    pub fn new(bytes: Vec<u8>, mime_type: MimeType) -> Self {
        Self { bytes, mime_type }
    }

    /// Reads an image from disk. Only `png`, `jpg` and `jpeg` files are
    /// accepted; anything else is refused before the file is opened.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplyError> {
        let path = path.as_ref();
        let mime_type = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(MimeType::from_filename)
            .ok_or_else(|| {
                ReplyError::Encoding(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!(
                        "Unsupported image format: {} (expected png, jpg or jpeg)",
                        path.display()
                    ),
                ))
            })?;

        let file = std::fs::File::open(path).map_err(ReplyError::Encoding)?;
        let mut bytes = Vec::new();
        std::io::BufReader::new(file)
            .read_to_end(&mut bytes)
            .map_err(ReplyError::Encoding)?;

        Ok(Self { bytes, mime_type })
    }

    pub fn encode(&self) -> InlineImage {
        InlineImage {
            mime_type: self.mime_type,
            data: BASE64.encode(&self.bytes),
        }
    }
}

/// Reads the whole stream once and returns its base64 encoding (standard
/// alphabet, padded, no line wrapping).
pub fn encode_image<R: Read>(mut reader: R) -> Result<String, ReplyError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(ReplyError::Encoding)?;
    Ok(BASE64.encode(bytes))
}

/// Returns the clause for a tone, synthesizing a generic one for unknown tones.
pub fn tone_instruction(tone: &str) -> Cow<'static, str> {
    let key = tone.to_lowercase();
    TONE_INSTRUCTIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, clause)| Cow::Borrowed(*clause))
        .unwrap_or_else(|| Cow::Owned(format!("Respond in a {tone} tone.")))
}

/// Renders the full instruction sent alongside the image.
pub fn build_prompt(tone: &str) -> String {
    format!(
        "{PROMPT_PREAMBLE}\nTone: {}\n\n{PROMPT_CLOSING}",
        tone_instruction(tone)
    )
}

/// Picks the custom tone when it is not blank, otherwise the selected one.
pub fn resolve_tone(selected: &str, custom: Option<&str>) -> Option<String> {
    custom
        .map(str::trim)
        .filter(|custom| !custom.is_empty())
        .or_else(|| Some(selected.trim()).filter(|selected| !selected.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device unplugged"))
        }
    }

    #[test]
    fn every_supported_tone_has_a_registered_clause() {
        for tone in SUPPORTED_TONES {
            let (_, clause) = TONE_INSTRUCTIONS
                .iter()
                .find(|(name, _)| *name == tone)
                .expect("tone should be registered");
            let prompt = build_prompt(tone);
            assert!(prompt.contains(clause), "{tone} clause missing");
            assert!(!prompt.contains(&format!("Respond in a {tone} tone.")));
        }
    }

    #[test]
    fn tone_lookup_ignores_case() {
        assert_eq!(
            tone_instruction("SaRcAsTiC"),
            "Respond with subtle sarcasm and wit."
        );
        assert_eq!(tone_instruction("Happy"), tone_instruction("happy"));
    }

    #[test]
    fn supported_tones_match_the_clause_table() {
        let registered: Vec<&str> = TONE_INSTRUCTIONS.iter().map(|(name, _)| *name).collect();
        assert_eq!(registered, SUPPORTED_TONES);
    }

    #[test]
    fn padded_tone_is_not_a_registered_tone() {
        let prompt = build_prompt(" happy ");
        assert!(prompt.contains("Tone: Respond in a  happy  tone."));
        assert!(!prompt.contains("Respond with positivity, warmth, and cheerfulness."));
    }

    #[test]
    fn unknown_tone_uses_generic_clause_verbatim() {
        let prompt = build_prompt("Mildly Passive-Aggressive");
        assert!(prompt.contains("Respond in a Mildly Passive-Aggressive tone."));
    }

    #[test]
    fn prompt_has_preamble_clause_and_closing_in_order() {
        let prompt = build_prompt("funny");
        let preamble = prompt.find("Identify the last message").unwrap();
        let clause = prompt.find("Tone: Respond with humor").unwrap();
        let closing = prompt.find(PROMPT_CLOSING).unwrap();
        assert!(preamble < clause && clause < closing);
        assert!(prompt.ends_with(PROMPT_CLOSING));
    }

    #[test]
    fn empty_image_encodes_to_empty_string() {
        assert_eq!(encode_image(&b""[..]).unwrap(), "");
    }

    #[test]
    fn encoding_preserves_binary_bytes() {
        let bytes: Vec<u8> = vec![0xff, 0xd8, 0xff, 0x00, 0x80, 0xfe, 0x0a, 0x0d, 0x7f];
        let encoded = encode_image(bytes.as_slice()).unwrap();
        assert!(!encoded.contains('\n'));
        assert_eq!(BASE64.decode(encoded).unwrap(), bytes);

        let asset = ImageAsset::new(bytes.clone(), MimeType::Png);
        let inline = asset.encode();
        assert_eq!(inline.mime_type, MimeType::Png);
        assert_eq!(BASE64.decode(inline.data).unwrap(), bytes);
    }

    #[test]
    fn unreadable_stream_is_an_encoding_error() {
        let err = encode_image(BrokenReader).unwrap_err();
        assert!(matches!(err, ReplyError::Encoding(_)));
    }

    #[test]
    fn missing_file_is_an_encoding_error() {
        let err = ImageAsset::from_path("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, ReplyError::Encoding(_)));
    }

    #[test]
    fn image_file_is_read_with_its_declared_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.PNG");
        std::fs::write(&path, b"\x89PNG\r\n").unwrap();

        let asset = ImageAsset::from_path(&path).unwrap();
        assert_eq!(asset.mime_type, MimeType::Png);
        assert_eq!(asset.bytes, b"\x89PNG\r\n");
    }

    #[test]
    fn unsupported_extension_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let err = ImageAsset::from_path(&path).unwrap_err();
        assert!(matches!(err, ReplyError::Encoding(_)));
        assert!(err.user_message().contains("chat.gif"));
    }

    #[test]
    fn mime_type_detection() {
        assert_eq!(MimeType::from_filename("chat.PNG"), Some(MimeType::Png));
        assert_eq!(MimeType::from_filename("chat.jpeg"), Some(MimeType::Jpeg));
        assert_eq!(MimeType::from_filename("chat.jpg"), Some(MimeType::Jpeg));
        assert_eq!(MimeType::from_filename("chat.gif"), None);
        assert_eq!(MimeType::from_filename("chat"), None);
        assert_eq!(
            MimeType::from_content_type("image/png; charset=binary"),
            Some(MimeType::Png)
        );
        assert_eq!(MimeType::from_content_type("text/plain"), None);
    }

    #[test]
    fn custom_tone_wins_when_not_blank() {
        assert_eq!(
            resolve_tone("happy", Some("witty")).as_deref(),
            Some("witty")
        );
        assert_eq!(resolve_tone("happy", Some("   ")).as_deref(), Some("happy"));
        assert_eq!(resolve_tone("happy", None).as_deref(), Some("happy"));
        assert_eq!(resolve_tone(" ", Some("")), None);
    }
}
