use std::time::Duration;

use reqwest::blocking::Client;

use super::{HttpClient, HttpError};

/// [`HttpClient`] backed by a blocking [`reqwest`] client
#[derive(Debug, Clone)]
pub struct ReqwestClient {
  client: Client,
}

impl ReqwestClient {
  /// Build a client with reqwest's defaults
  pub fn new() -> Result<Self, HttpError> {
    Client::builder().build()
                     .map(|client| Self { client })
                     .map_err(|e| HttpError::Other(e.to_string()))
  }
}

fn classify(error: reqwest::Error) -> HttpError {
  if error.is_timeout() {
    HttpError::Timeout
  } else if error.is_connect() {
    HttpError::Connect(error.to_string())
  } else {
    HttpError::Other(error.to_string())
  }
}

impl HttpClient for ReqwestClient {
  fn execute(&self,
             req: http::Request<Vec<u8>>,
             timeout: Duration)
             -> Result<http::Response<Vec<u8>>, HttpError> {
    let (parts, body) = req.into_parts();

    let resp = self.client
                   .request(parts.method, parts.uri.to_string())
                   .headers(parts.headers)
                   .body(body)
                   .timeout(timeout)
                   .send()
                   .map_err(classify)?;

    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.bytes().map_err(classify)?.to_vec();

    let mut out = http::Response::builder().status(status)
                                           .body(body)
                                           .map_err(|e| HttpError::Other(e.to_string()))?;
    *out.headers_mut() = headers;
    Ok(out)
  }
}
