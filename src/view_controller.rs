use crate::data_types::ViewportRange;

/// Narrowest time window worth drawing, in seconds.
pub const MIN_SPAN_SECS: f64 = 1.0;

/// Span multiplier per scroll step. One step in and one step out cancel out.
const SCROLL_STEP: f64 = 1.1;

/// Interaction math for the time axis, kept free of any UI toolkit.
pub struct ViewController;

impl ViewController {
    /// Pans the time axis by a pixel delta. Dragging right reveals older data.
    pub fn pan_axis(range: &mut ViewportRange, delta_pixels: f32, total_pixels: f32) {
        if total_pixels <= 0.0 {
            return;
        }
        let secs_per_pixel = range.span() / f64::from(total_pixels);
        range.pan(-f64::from(delta_pixels) * secs_per_pixel);
        range.clamp();
    }

    /// Zooms at a pivot expressed as a fraction of the visible window.
    pub fn zoom_axis_at(range: &mut ViewportRange, pivot_pct: f64, factor: f64) {
        let span = range.span();
        let factor = if span > 0.0 {
            factor.max(MIN_SPAN_SECS / span)
        } else {
            factor
        };
        let pivot = range.min + span * pivot_pct;
        range.zoom_at(pivot, pivot_pct, factor);
        range.clamp();
    }

    /// Span multiplier for `steps` of scroll. Positive steps zoom in.
    pub fn scroll_zoom_factor(steps: f64) -> f64 {
        SCROLL_STEP.powf(-steps)
    }

    /// Y bounds padded by `margin_pct` of the data span. A flat series is
    /// padded as if it spanned one unit. `None` for non-finite bounds.
    pub fn auto_fit_y(lo: f64, hi: f64, margin_pct: f64) -> Option<(f64, f64)> {
        if !lo.is_finite() || !hi.is_finite() {
            return None;
        }
        let span = if hi - lo > f64::EPSILON { hi - lo } else { 1.0 };
        let pad = span * margin_pct;
        Some((lo - pad, hi + pad))
    }

    /// Centres the window on `center`, then keeps it inside `bounds` (usually
    /// the span of buffered data). A window wider than `bounds` shrinks to it.
    pub fn move_to_center(range: &mut ViewportRange, center: f64, bounds: Option<(f64, f64)>) {
        let half = range.span() / 2.0;
        range.min = center - half;
        range.max = center + half;

        if let Some((lo, hi)) = bounds {
            if range.span() > hi - lo {
                range.min = lo;
                range.max = hi;
            } else {
                let mut inside = range.with_limits(Some(lo), Some(hi));
                inside.clamp();
                range.min = inside.min;
                range.max = inside.max;
            }
        }
        range.clamp();
    }
}
