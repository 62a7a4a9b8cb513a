use crate::backend::UpstreamRequest;

use super::PipelineError;

/// Produces the sequence of upstream requests a [`super::TransformerHandler`]
/// issues for one incoming client request. Called repeatedly with the
/// previous request and the data read from its response, until it returns
/// `None` to signal completion.
pub trait RequestIterator: Send + Sync {
    fn next(
        &self,
        prev_request: &UpstreamRequest,
        prev_response_data: Option<&[u8]>,
    ) -> Result<Option<UpstreamRequest>, PipelineError>;
}

/// Issues exactly one request: the given initial request, then stops. Most
/// routes use this; a paginating iterator would instead inspect
/// `prev_response_data` to decide whether another page is needed.
pub struct DirectRequestIterator;

impl RequestIterator for DirectRequestIterator {
    fn next(
        &self,
        prev_request: &UpstreamRequest,
        prev_response_data: Option<&[u8]>,
    ) -> Result<Option<UpstreamRequest>, PipelineError> {
        match prev_response_data {
            None => Ok(Some(prev_request.clone())),
            Some(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_initial_request_once_then_stops() {
        let iter = DirectRequestIterator;
        let req = UpstreamRequest::new("GET", "http://upstream/x");
        let first = iter.next(&req, None).unwrap();
        assert!(first.is_some());
        let second = iter.next(&req, Some(b"body")).unwrap();
        assert!(second.is_none());
    }
}
