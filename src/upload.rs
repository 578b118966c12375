//! Upload form submission.
//!
//! Posts the form as `multipart/form-data`: the recording as a file part and
//! the duration as a text field, the shape the practice server's `/record`
//! route reads. The server answers a successful upload with a redirect, so
//! redirects are not followed and count as success.

use anyhow::anyhow;
use std::time::Duration;

use crate::config::UploadConfig;
use crate::recording::widget::UploadForm;
use crate::recording::AudioFile;

/// File extensions the server accepts.
const ALLOWED_EXTENSIONS: [&str; 1] = ["wav"];

/// Server response to a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub status: u16,
    /// Redirect target, when the server answered with one
    pub location: Option<String>,
}

/// Checks that the form carries exactly one acceptable file.
///
/// # Errors
/// - If the file input is empty (finalization has not finished yet)
/// - If the file name is empty or has a disallowed extension
pub fn validate(form: &UploadForm) -> anyhow::Result<&AudioFile> {
    let file = match form.files() {
        [] => return Err(anyhow!("No audio file provided")),
        [file] => file,
        files => return Err(anyhow!("Expected one audio file, found {}", files.len())),
    };
    if file.name().is_empty() {
        return Err(anyhow!("No file selected"));
    }

    let allowed = file
        .name()
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
    if !allowed {
        return Err(anyhow!(
            "File type not allowed: {}. Expected a .wav recording.",
            file.name()
        ));
    }
    Ok(file)
}

/// Submits the form to the configured endpoint.
///
/// # Errors
/// - If the form does not validate
/// - If the server cannot be reached or answers with an error status
pub async fn submit(config: &UploadConfig, form: &UploadForm) -> anyhow::Result<UploadReceipt> {
    let file = validate(form)?;

    let file_part = reqwest::multipart::Part::bytes(file.bytes().to_vec())
        .file_name(file.name().to_string())
        .mime_str(file.mime())
        .map_err(|e| anyhow!("Failed to create file part for upload: {e}"))?;

    let multipart = reqwest::multipart::Form::new()
        .part(config.file_field.clone(), file_part)
        .text(config.duration_field.clone(), form.duration().to_string());

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {e}"))?;

    tracing::debug!(
        "Upload:\n  URL: {}\n  Method: POST\n  Body parameters: {}=<{} bytes, {}>, {}={}",
        config.endpoint,
        config.file_field,
        file.size(),
        file.name(),
        config.duration_field,
        form.duration()
    );

    let mut request = client.post(&config.endpoint).multipart(multipart);
    if let Some(cookie) = &config.cookie {
        request = request.header(reqwest::header::COOKIE, cookie);
    }

    let response = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            let error_msg = if e.is_connect() {
                format!("Failed to connect to {}. Is the server running?", config.endpoint)
            } else if e.is_timeout() {
                format!("Upload to {} timed out.", config.endpoint)
            } else {
                format!("Upload network error: {e}")
            };
            return Err(anyhow!(error_msg));
        }
    };

    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let human_readable = match status.as_u16() {
            401 | 403 => "The server refused the upload. Log in and set upload.cookie in the config.".to_string(),
            413 => "The recording is too large for the server.".to_string(),
            500..=599 => format!("The server failed to process the upload (status {status})."),
            _ => format!("Upload failed (status {status}): {error_body}"),
        };
        return Err(anyhow!(human_readable));
    }

    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::info!(
        "Uploaded {} ({} bytes): status {}",
        file.name(),
        file.size(),
        status
    );
    Ok(UploadReceipt {
        status: status.as_u16(),
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::session::{AudioBlob, AUDIO_MIME};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn form_with(name: &str, duration: f64) -> UploadForm {
        let mut form = UploadForm::default();
        form.set_file(AudioFile::new(
            name,
            AudioBlob::new(b"RIFF-test-audio".to_vec(), AUDIO_MIME),
        ));
        form.set_duration(duration);
        form
    }

    /// Accepts one request, returns it raw, and answers with `response`.
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}/record"), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[test]
    fn test_validate_rejects_empty_form() {
        let err = validate(&UploadForm::default()).unwrap_err();
        assert!(err.to_string().contains("No audio file"));
    }

    #[test]
    fn test_validate_checks_extension() {
        assert!(validate(&form_with("recording_1.wav", 1.0)).is_ok());
        assert!(validate(&form_with("recording_1.WAV", 1.0)).is_ok());
        assert!(validate(&form_with("recording_1.mp3", 1.0)).is_err());
        assert!(validate(&form_with("recording", 1.0)).is_err());
    }

    #[tokio::test]
    async fn test_submit_posts_file_and_duration() {
        let (endpoint, server) = one_shot_server(
            "HTTP/1.1 302 FOUND\r\nLocation: /recordings\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let config = UploadConfig {
            endpoint,
            cookie: Some("session=abc".to_string()),
            ..UploadConfig::default()
        };

        let receipt = submit(&config, &form_with("recording_1700.wav", 3.5))
            .await
            .unwrap();
        assert_eq!(receipt.status, 302);
        assert_eq!(receipt.location.as_deref(), Some("/recordings"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /record "));
        assert!(request.contains("cookie: session=abc"));
        assert!(request.contains(r#"name="audio"; filename="recording_1700.wav""#));
        assert!(request.contains("Content-Type: audio/wav"));
        assert!(request.contains("RIFF-test-audio"));
        assert!(request.contains("name=\"duration\"\r\n\r\n3.5\r\n"));
    }

    #[tokio::test]
    async fn test_submit_reports_server_errors() {
        let (endpoint, server) = one_shot_server(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\noops",
        )
        .await;
        let config = UploadConfig {
            endpoint,
            ..UploadConfig::default()
        };

        let err = submit(&config, &form_with("recording_1.wav", 1.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status 500"));
        server.await.unwrap();
    }
}
