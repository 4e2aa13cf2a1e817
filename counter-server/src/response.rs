use {
    http::{HeaderMap, HeaderValue, StatusCode, header::IntoHeaderName},
    hyper::{Response, body::Bytes},
    http_body_util::Full,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: vec![],
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header<K: IntoHeaderName>(mut self, header_name: K, header_value: HeaderValue) -> Self {
        self.headers.insert(header_name, header_value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl From<HttpResponse> for Response<Full<Bytes>> {
    fn from(value: HttpResponse) -> Self {
        let mut response = Response::new(Full::new(Bytes::from(value.body)));
        *response.status_mut() = value.status;
        *response.headers_mut() = value.headers;
        response
    }
}
