use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Status of a content-generation job in the remote queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal statuses end the polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the forward-only lifecycle. A poll response reporting a
    /// lower rank than the current status is a backend regression and is
    /// ignored.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::InProgress => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Progress label shown next to the form while the job is tracked.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued…",
            JobStatus::InProgress => "Processing…",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }
}

/// Content style options offered by the creation form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
pub enum ContentStyle {
    Informative,
    Inspirational,
    Promotional,
    Educational,
    Engaging,
}

/// Target platforms a generated post should be published to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformSelection {
    pub instagram: bool,
    pub linkedin: bool,
    pub facebook: bool,
}

impl PlatformSelection {
    pub fn any(&self) -> bool {
        self.instagram || self.linkedin || self.facebook
    }

    pub fn all() -> Self {
        Self {
            instagram: true,
            linkedin: true,
            facebook: true,
        }
    }
}

/// Identity of the signed-in user a request is made on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub username: String,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// A content-generation request, validated before submission and replayed
/// verbatim on retry.
///
/// Field names mirror the deployed queue contract exactly; a retry must
/// serialize to a payload identical to the original submission.
#[derive(Debug, Clone, Serialize, Validate, PartialEq)]
pub struct JobRequest {
    /// Free-text marketing theme.
    #[garde(length(min = 1, max = 500))]
    pub prompt: String,

    /// Number of images to generate (the form offers 1–5).
    #[garde(range(min = 1, max = 5))]
    #[serde(rename = "numImages")]
    pub num_images: u32,

    #[garde(skip)]
    #[serde(rename = "contentType")]
    pub content_style: ContentStyle,

    #[garde(custom(has_target_platform))]
    pub platforms: PlatformSelection,

    // The flag travels under both keys: older queue workers read `meme`,
    // newer ones `meme_mode`.
    #[garde(skip)]
    pub meme: bool,
    #[garde(skip)]
    pub meme_mode: bool,

    #[garde(skip)]
    #[serde(flatten)]
    pub requester: Requester,
}

impl JobRequest {
    pub fn new(
        prompt: impl Into<String>,
        num_images: u32,
        content_style: ContentStyle,
        platforms: PlatformSelection,
        meme_mode: bool,
        requester: Requester,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            num_images,
            content_style,
            platforms,
            meme: meme_mode,
            meme_mode,
            requester,
        }
    }
}

fn has_target_platform(value: &PlatformSelection, _: &()) -> garde::Result {
    if value.any() {
        Ok(())
    } else {
        Err(garde::Error::new("select at least one target platform"))
    }
}

/// A submitted job being tracked to a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    /// Identifier assigned by the remote queue at enqueue time.
    pub job_id: String,
    pub status: JobStatus,
    /// Opaque result payload (`image_urls`, `pdf_url`, ...); present once
    /// the job completes.
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobHandle {
    pub fn queued(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            result: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> JobRequest {
        JobRequest::new(
            "eco products",
            3,
            ContentStyle::Promotional,
            PlatformSelection {
                instagram: true,
                ..Default::default()
            },
            false,
            Requester::new("alice", "alice"),
        )
    }

    #[test]
    fn test_valid_request_passes_validation() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let mut request = valid_request();
        request.prompt = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_image_count_bounds() {
        let mut request = valid_request();
        request.num_images = 0;
        assert!(request.validate().is_err());
        request.num_images = 6;
        assert!(request.validate().is_err());
        request.num_images = 5;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_platform_set_rejected() {
        let mut request = valid_request();
        request.platforms = PlatformSelection::default();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_payload_keys_match_queue_contract() {
        let payload = serde_json::to_value(valid_request()).unwrap();
        assert_eq!(payload["prompt"], "eco products");
        assert_eq!(payload["numImages"], 3);
        assert_eq!(payload["contentType"], "Promotional");
        assert_eq!(payload["platforms"]["instagram"], true);
        assert_eq!(payload["meme"], false);
        assert_eq!(payload["meme_mode"], false);
        assert_eq!(payload["user_id"], "alice");
        assert_eq!(payload["username"], "alice");
    }

    #[test]
    fn test_status_rank_is_forward_only() {
        assert!(JobStatus::Queued.rank() < JobStatus::InProgress.rank());
        assert!(JobStatus::InProgress.rank() < JobStatus::Completed.rank());
        assert!(JobStatus::InProgress.rank() < JobStatus::Failed.rank());
    }
}
