// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::RefCell;
use std::rc::Rc;

use glyph_cache::kurbo::{Point, Vec2};
use glyph_cache::peniko::Color;
use glyph_cache::{
    ExternalMetrics, ExternalSource, ExternalSourceProvider, GlyphId, IntRect, RasterTarget,
    SourceRequest, WritingMode, XGlyph,
};

/// Everything the fake sources were asked to do.
#[derive(Default, Debug)]
pub(crate) struct SourceLog {
    /// Names the provider was asked for.
    pub(crate) requests: Vec<String>,
    pub(crate) direct: Vec<(XGlyph, Point)>,
    pub(crate) masks: Vec<XGlyph>,
    pub(crate) released: usize,
}

/// Ink box of every external glyph: 6 pixels wide, rising 8 pixels above the baseline.
pub(crate) const EXTERNAL_BBOX: IntRect = IntRect::new(0, -8, 6, 0);

/// Hands out sources for a fixed set of font names.
#[derive(Debug)]
pub(crate) struct FakeProvider {
    pub(crate) names: Vec<String>,
    pub(crate) direct: bool,
    pub(crate) mask: bool,
    pub(crate) log: Rc<RefCell<SourceLog>>,
}

impl FakeProvider {
    pub(crate) fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            direct: false,
            mask: true,
            log: Rc::default(),
        }
    }
}

impl ExternalSourceProvider for FakeProvider {
    fn has_sources(&self) -> bool {
        !self.names.is_empty()
    }

    fn external_glyph_source_for(
        &mut self,
        request: &SourceRequest<'_>,
    ) -> Option<Box<dyn ExternalSource>> {
        self.log.borrow_mut().requests.push(request.name.to_string());
        if !self.names.iter().any(|n| n == request.name) {
            return None;
        }
        Some(Box::new(FakeSource {
            direct: self.direct,
            mask: self.mask,
            log: self.log.clone(),
        }))
    }
}

/// Knows glyphs for codes below 128.
struct FakeSource {
    direct: bool,
    mask: bool,
    log: Rc<RefCell<SourceLog>>,
}

impl ExternalSource for FakeSource {
    fn char_xglyph(
        &mut self,
        code: u32,
        _encoding_index: Option<u32>,
        _glyph: GlyphId,
    ) -> Option<XGlyph> {
        (code < 128).then_some(XGlyph(u64::from(code)))
    }

    fn char_metrics(&mut self, _: XGlyph, _: WritingMode) -> Option<ExternalMetrics> {
        Some(ExternalMetrics {
            advance: Vec2::new(7.0, 0.0),
            bbox: EXTERNAL_BBOX,
        })
    }

    fn render_direct(&mut self, xglyph: XGlyph, origin: Point, _: Color) -> bool {
        if self.direct {
            self.log.borrow_mut().direct.push((xglyph, origin));
        }
        self.direct
    }

    fn render_mask(
        &mut self,
        xglyph: XGlyph,
        origin: Point,
        target: &mut RasterTarget<'_>,
    ) -> bool {
        if !self.mask {
            return false;
        }
        self.log.borrow_mut().masks.push(xglyph);
        let (x, y) = (origin.x as i32, origin.y as i32);
        // A vertical stem on the left edge.
        target.fill_rect(IntRect::new(
            x + EXTERNAL_BBOX.x0,
            y + EXTERNAL_BBOX.y0,
            x + EXTERNAL_BBOX.x0 + 2,
            y + EXTERNAL_BBOX.y1,
        ));
        true
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.log.borrow_mut().released += 1;
    }
}
