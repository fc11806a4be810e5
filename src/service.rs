use crate::config::DashboardConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AnalysisSnapshot, DownloadCriteria, FilterOptionsResponse, GradeOption, GradeRiskResponse, SchoolOption,
    SearchCriteria,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Backend collaborator. Implementations must be cheap to share across tasks.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn get_filter_options(&self) -> AppResult<FilterOptionsResponse>;

    async fn get_schools_by_district(&self, district: &str) -> AppResult<Vec<SchoolOption>>;

    async fn get_grades_by_school(&self, school: &str, district: &str) -> AppResult<Vec<GradeOption>>;

    async fn get_prediction_insights(&self, criteria: &SearchCriteria) -> AppResult<AnalysisSnapshot>;

    async fn get_grade_risks(&self, district: &str, school: &str) -> AppResult<GradeRiskResponse>;

    /// Raw report bytes; saving them is up to the caller.
    async fn download_report(&self, report_type: &str, criteria: &DownloadCriteria) -> AppResult<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

#[derive(Clone)]
pub struct HttpDataService {
    client: Client,
    base_url: String,
}

impl HttpDataService {
    pub fn new(config: &DashboardConfig, bearer_token: Option<&str>) -> AppResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        if let Some(token) = bearer_token {
            let value = format!("Bearer {}", token)
                .parse()
                .map_err(|_| AppError::Validation("bearer token is not a valid header value".to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build http client: {}", error)))?;

        let base_url = if config.api_base_url.ends_with('/') {
            config.api_base_url.clone()
        } else {
            format!("{}/", config.api_base_url)
        };
        Ok(Self { client, base_url })
    }

    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> AppResult<Response> {
        let response = request.send().await.map_err(|error| {
            tracing::warn!(request = what, error = %error, "request failed before a response");
            AppError::from(error)
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.detail);
        tracing::warn!(request = what, status = status.as_u16(), "request rejected");
        Err(AppError::from_status(status.as_u16(), detail))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.send(self.client.get(self.url(path)), path).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| AppError::Request(format!("failed to parse {} response: {}", path, error)))
    }
}

#[async_trait]
impl DataService for HttpDataService {
    async fn get_filter_options(&self) -> AppResult<FilterOptionsResponse> {
        self.get_json("filter-options").await
    }

    async fn get_schools_by_district(&self, district: &str) -> AppResult<Vec<SchoolOption>> {
        self.get_json(&format!("schools/district/{}", district)).await
    }

    async fn get_grades_by_school(&self, school: &str, district: &str) -> AppResult<Vec<GradeOption>> {
        self.get_json(&format!("grades/district/{}/school/{}", district, school))
            .await
    }

    async fn get_prediction_insights(&self, criteria: &SearchCriteria) -> AppResult<AnalysisSnapshot> {
        let request = self.client.post(self.url("prediction-insights")).json(criteria);
        let response = self.send(request, "prediction-insights").await?;
        response
            .json::<AnalysisSnapshot>()
            .await
            .map_err(|error| AppError::Request(format!("failed to parse prediction insights: {}", error)))
    }

    async fn get_grade_risks(&self, district: &str, school: &str) -> AppResult<GradeRiskResponse> {
        self.get_json(&format!("grade-risks/district/{}/school/{}", district, school))
            .await
    }

    async fn download_report(&self, report_type: &str, criteria: &DownloadCriteria) -> AppResult<Vec<u8>> {
        let path = format!("download/report/{}", report_type);
        let request = self.client.post(self.url(&path)).json(criteria);
        let response = self.send(request, &path).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
