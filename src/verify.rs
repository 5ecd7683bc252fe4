//! Identity-verification API client.
//!
//! The vendor SDK's callback pairs (success payload / error list) map onto
//! plain `Result` returns here, with no loss of information.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("api errors: {0:?}")]
    Api(Vec<ApiError>),
}

impl VerifyError {
    /// First error message, the way the original demo surfaces callback
    /// errors to the log.
    pub fn first_message(&self) -> String {
        match self {
            VerifyError::Transport(e) => e.to_string(),
            VerifyError::Api(errors) => errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Unknown error".to_string()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadImageResponse {
    pub image_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncCardInfoRequest {
    pub card_type: String,
    /// Image referenced by id from a prior upload.
    pub image1_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CardInfoResponse {
    /// Extracted card fields; opaque to this client.
    #[serde(default)]
    pub card: serde_json::Value,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn initialize(&self) -> Result<(), VerifyError>;
    async fn upload_image(
        &self,
        image: Vec<u8>,
        label: &str,
    ) -> Result<UploadImageResponse, VerifyError>;
    async fn sync_card_info(
        &self,
        req: SyncCardInfoRequest,
    ) -> Result<CardInfoResponse, VerifyError>;
}

pub struct HttpIdentityApi {
    base: Url,
    http: reqwest::Client,
}

impl HttpIdentityApi {
    pub fn new(base: Url, http: reqwest::Client) -> Self {
        Self { base, http }
    }

    fn endpoint(&self, path: &str) -> Result<Url, VerifyError> {
        self.base.join(path).map_err(|_| {
            VerifyError::Api(vec![ApiError {
                code: None,
                message: format!("invalid endpoint path: {path}"),
            }])
        })
    }
}

async fn error_from(resp: reqwest::Response) -> VerifyError {
    let status = resp.status();
    let mut errors = resp
        .json::<ErrorBody>()
        .await
        .map(|b| b.errors)
        .unwrap_or_default();
    if errors.is_empty() {
        errors.push(ApiError {
            code: Some(status.as_u16().to_string()),
            message: format!("http status {status}"),
        });
    }
    VerifyError::Api(errors)
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, VerifyError> {
    if resp.status().is_success() {
        return Ok(resp.json::<T>().await?);
    }
    Err(error_from(resp).await)
}

/// Success is the status line alone; the init endpoint replies with an
/// empty body.
async fn check_status(resp: reqwest::Response) -> Result<(), VerifyError> {
    if resp.status().is_success() {
        return Ok(());
    }
    Err(error_from(resp).await)
}

#[async_trait]
impl IdentityApi for HttpIdentityApi {
    async fn initialize(&self) -> Result<(), VerifyError> {
        let resp = self.http.post(self.endpoint("init")?).send().await?;
        check_status(resp).await
    }

    async fn upload_image(
        &self,
        image: Vec<u8>,
        label: &str,
    ) -> Result<UploadImageResponse, VerifyError> {
        let mut url = self.endpoint("images")?;
        url.query_pairs_mut().append_pair("label", label);
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(image)
            .send()
            .await?;
        parse_response(resp).await
    }

    async fn sync_card_info(
        &self,
        req: SyncCardInfoRequest,
    ) -> Result<CardInfoResponse, VerifyError> {
        let resp = self
            .http
            .post(self.endpoint("cards/sync")?)
            .json(&req)
            .send()
            .await?;
        parse_response(resp).await
    }
}

/// Upload a captured frame, then sync card info by the returned image id.
pub async fn run_id_check(
    api: &dyn IdentityApi,
    image: Vec<u8>,
    label: &str,
    card_type: &str,
) -> Result<CardInfoResponse, VerifyError> {
    let uploaded = api.upload_image(image, label).await?;
    info!(image_id = %uploaded.image_id, "image uploaded");
    api.sync_card_info(SyncCardInfoRequest {
        card_type: card_type.to_string(),
        image1_id: uploaded.image_id,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeApi {
        uploads: Mutex<Vec<(usize, String)>>,
        syncs: Mutex<Vec<SyncCardInfoRequest>>,
        fail_upload: bool,
    }

    #[async_trait]
    impl IdentityApi for FakeApi {
        async fn initialize(&self) -> Result<(), VerifyError> {
            Ok(())
        }

        async fn upload_image(
            &self,
            image: Vec<u8>,
            label: &str,
        ) -> Result<UploadImageResponse, VerifyError> {
            if self.fail_upload {
                return Err(VerifyError::Api(vec![ApiError {
                    code: Some("image_too_small".into()),
                    message: "image resolution too low".into(),
                }]));
            }
            self.uploads.lock().push((image.len(), label.to_string()));
            Ok(UploadImageResponse {
                image_id: "img-1".into(),
            })
        }

        async fn sync_card_info(
            &self,
            req: SyncCardInfoRequest,
        ) -> Result<CardInfoResponse, VerifyError> {
            self.syncs.lock().push(req);
            Ok(CardInfoResponse {
                card: serde_json::json!({"id_number": "0123"}),
            })
        }
    }

    #[tokio::test]
    async fn id_check_chains_upload_into_sync() {
        let api = FakeApi::default();
        let resp = run_id_check(&api, vec![0u8; 16], "id_card.vn.national_id.front", "vn.national_id")
            .await
            .unwrap();
        assert_eq!(resp.card["id_number"], "0123");

        let uploads = api.uploads.lock();
        assert_eq!(*uploads, vec![(16, "id_card.vn.national_id.front".to_string())]);
        let syncs = api.syncs.lock();
        assert_eq!(syncs[0].card_type, "vn.national_id");
        assert_eq!(syncs[0].image1_id, "img-1");
    }

    #[tokio::test]
    async fn upload_failure_short_circuits_the_chain() {
        let api = FakeApi {
            fail_upload: true,
            ..Default::default()
        };
        let err = run_id_check(&api, vec![0u8; 16], "label", "vn.national_id")
            .await
            .unwrap_err();
        assert_eq!(err.first_message(), "image resolution too low");
        assert!(api.syncs.lock().is_empty());
    }

    #[tokio::test]
    async fn init_succeeds_on_2xx_with_empty_body() {
        let resp =
            reqwest::Response::from(http::Response::builder().status(200).body("").unwrap());
        assert!(check_status(resp).await.is_ok());
    }

    #[tokio::test]
    async fn init_failure_carries_the_error_list() {
        let resp = reqwest::Response::from(
            http::Response::builder()
                .status(422)
                .body(r#"{"errors":[{"message":"license expired"}]}"#)
                .unwrap(),
        );
        let err = check_status(resp).await.unwrap_err();
        assert_eq!(err.first_message(), "license expired");
    }

    #[test]
    fn error_body_deserializes_into_error_list() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"errors":[{"code":"bad_image","message":"blurry"},{"message":"retake"}]}"#,
        )
        .unwrap();
        let err = VerifyError::Api(body.errors);
        assert_eq!(err.first_message(), "blurry");
    }

    #[test]
    fn empty_error_list_falls_back_to_unknown() {
        assert_eq!(VerifyError::Api(vec![]).first_message(), "Unknown error");
    }
}
