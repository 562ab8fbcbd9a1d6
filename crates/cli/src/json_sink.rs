use std::io::Write;

use serde::Serialize;

use facemood_core::pipeline::emotion_result::EmotionResult;
use facemood_core::pipeline::presentation::PresentationSink;
use facemood_core::shared::face_region::FaceRegion;

/// Prints every presentation event as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
    written: usize,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Record<'a> {
    Result {
        #[serde(skip_serializing_if = "Option::is_none")]
        generation: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sequence: Option<u64>,
        label: &'a str,
        faces: Vec<FaceRecord<'a>>,
    },
    Clear,
}

#[derive(Serialize)]
struct FaceRecord<'a> {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
}

impl<'a> FaceRecord<'a> {
    fn new(region: &FaceRegion, label: Option<&'a str>) -> Self {
        Self {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            label,
        }
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Lines written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, record: &Record<'_>) {
        let result = serde_json::to_writer(&mut self.out, record)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out))
            .and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.written += 1,
            Err(e) => log::warn!("Failed to write result: {e}"),
        }
    }
}

impl<W: Write> PresentationSink for JsonLinesSink<W> {
    fn present(&mut self, label: &str, regions: &[FaceRegion]) {
        let faces = regions.iter().map(|r| FaceRecord::new(r, None)).collect();
        self.write(&Record::Result {
            generation: None,
            sequence: None,
            label,
            faces,
        });
    }

    fn clear_overlay(&mut self) {
        self.write(&Record::Clear);
    }

    fn present_result(&mut self, result: &EmotionResult) {
        let faces = result
            .faces()
            .iter()
            .map(|face| FaceRecord::new(&face.region, Some(face.label.as_str())))
            .collect();
        self.write(&Record::Result {
            generation: Some(result.generation()),
            sequence: Some(result.sequence()),
            label: result.label().as_str(),
            faces,
        });
    }
}
