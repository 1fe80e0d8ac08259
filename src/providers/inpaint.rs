use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::info;

use super::{ClientFuture, InpaintingClient};
use crate::analysis::BBoxNorm;

/// Placeholder inpainting client. Background reconstruction is not
/// implemented; the image passes through unchanged so the pipeline can
/// run end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubInpainter;

impl InpaintingClient for StubInpainter {
    fn inpaint_regions(&self, image: Vec<u8>, regions: Vec<BBoxNorm>) -> ClientFuture<Vec<u8>> {
        Box::pin(async move {
            info!(
                "ServiceCall service=INPAINTING endpoint=stub://inpainting method=STUB payloadSizeBytes={} regions={}",
                image.len(),
                regions.len()
            );
            let start = Instant::now();
            sleep(Duration::from_millis(1)).await;
            info!(
                "ServiceResponse service=INPAINTING status=200 durationMs={} responseSizeBytes={} stub=true",
                start.elapsed().as_millis(),
                image.len()
            );
            Ok(image)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_returns_the_image_unchanged() {
        let image = vec![7u8; 64];
        let regions = vec![BBoxNorm {
            x1: 0.1,
            y1: 0.1,
            x2: 0.5,
            y2: 0.2,
        }];
        let out = StubInpainter
            .inpaint_regions(image.clone(), regions)
            .await
            .unwrap();
        assert_eq!(out, image);
    }
}
