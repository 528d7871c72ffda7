use async_trait::async_trait;
use parking_lot::Mutex;
use remedy_rs_protocol::{CollaboratorError, ImageInput, PrescriptionData, PrescriptionReader};
use std::sync::Arc;

/// Reader that returns the same prescription for every image and records
/// the media ids it was shown.
#[derive(Debug, Clone)]
pub struct FixedReader {
    prescription: PrescriptionData,
    seen: Arc<Mutex<Vec<String>>>,
}

impl FixedReader {
    pub fn new(prescription: PrescriptionData) -> Self {
        Self {
            prescription,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PrescriptionReader for FixedReader {
    async fn read(&self, image: &ImageInput) -> Result<PrescriptionData, CollaboratorError> {
        self.seen.lock().push(image.media_id.clone());
        Ok(self.prescription.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FailingReader;

#[async_trait]
impl PrescriptionReader for FailingReader {
    async fn read(&self, _image: &ImageInput) -> Result<PrescriptionData, CollaboratorError> {
        Err(CollaboratorError::Malformed("unreadable image".to_string()))
    }
}
