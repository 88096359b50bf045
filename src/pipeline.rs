use crate::{
    ReplyModel, RequestMetadata,
    client::GeminiClient,
    error::ReplyError,
    payload::{ImageAsset, MimeType},
};

/// One user submission: an image and the tone to answer in.
#[derive(Clone, Debug)]
pub struct ReplyRequest {
    pub image: ImageAsset,
    pub tone: String,
}

/// What the engine keeps about a request without holding on to the image.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplyMetadata {
    pub tone: String,
    pub image_bytes: usize,
    pub mime_type: MimeType,
}

impl RequestMetadata for ReplyRequest {
    type Metadata = ReplyMetadata;

    fn metadata(&self) -> Self::Metadata {
        ReplyMetadata {
            tone: self.tone.clone(),
            image_bytes: self.image.bytes.len(),
            mime_type: self.image.mime_type,
        }
    }
}

/// Encodes the image and asks Gemini for a reply.
pub struct ReplyPipeline {
    client: GeminiClient,
}

impl ReplyPipeline {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    pub fn generate(&self, request: &ReplyRequest) -> Result<String, ReplyError> {
        let encoded = request.image.encode();
        log::debug!(
            "Encoded {} image bytes for tone '{}'",
            request.image.bytes.len(),
            request.tone
        );

        let result = self.client.generate_reply(&encoded, &request.tone);
        match &result {
            Ok(reply) => log::info!("Generated a {} character reply", reply.chars().count()),
            Err(e) => log::error!("Reply generation failed at {}: {e}", e.stage()),
        }
        result
    }
}

impl ReplyModel for ReplyPipeline {
    type Request = ReplyRequest;
    type Response = String;
    type Error = ReplyError;

    fn run(&mut self, request: Self::Request) -> Result<Self::Response, Self::Error> {
        self.generate(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_does_not_copy_the_image() {
        let request = ReplyRequest {
            image: ImageAsset::new(vec![1, 2, 3, 4], MimeType::Png),
            tone: "casual".to_string(),
        };
        assert_eq!(
            request.metadata(),
            ReplyMetadata {
                tone: "casual".to_string(),
                image_bytes: 4,
                mime_type: MimeType::Png,
            }
        );
    }
}
