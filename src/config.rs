use std::path::PathBuf;
use std::time::Duration;

const POINTS_PER_INCH: f32 = 72.0;

/// Page size for image pages, in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width: 595.2756,
        height: 841.8898,
    };
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    /// Parse `A4`, `letter`, or `WxH` in inches (e.g. `8.5x11`).
    pub fn parse(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "a4" => return Ok(Self::A4),
            "letter" => return Ok(Self::LETTER),
            _ => {}
        }
        let (w, h) = trimmed
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid page size: {s} (expected A4, letter or WxH)"))?;
        let w: f32 = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid page width: {w}"))?;
        let h: f32 = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid page height: {h}"))?;
        if !(w > 0.0 && h > 0.0) {
            return Err(format!("page dimensions must be positive: {s}"));
        }
        let (width, height) = (w * POINTS_PER_INCH, h * POINTS_PER_INCH);
        if !(width.is_finite() && height.is_finite()) {
            return Err(format!("page dimensions must be finite: {s}"));
        }
        Ok(Self { width, height })
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Options handed to every conversion routine.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub page_size: PageSize,
    /// Margin around image pages, in points.
    pub margin: f32,
    /// Extra directories scanned for fonts, ahead of the system ones.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margin: 0.5 * POINTS_PER_INCH,
            font_dirs: Vec::new(),
        }
    }
}

impl ConvertOptions {
    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_margin_inches(mut self, inches: f32) -> Self {
        self.margin = inches.max(0.0) * POINTS_PER_INCH;
        self
    }
}

/// Job-level configuration: routing and limits.
#[derive(Clone, Debug)]
pub struct Config {
    pub options: ConvertOptions,
    /// `None` lets a conversion run for as long as it takes.
    pub timeout: Option<Duration>,
    /// Whether PNG/JPEG → PDF routes are registered.
    pub image_routes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            options: ConvertOptions::default(),
            timeout: Some(Duration::from_secs(300)),
            image_routes: true,
        }
    }
}

impl Config {
    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_image_routes(mut self, enabled: bool) -> Self {
        self.image_routes = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_named_sizes() {
        assert_eq!(PageSize::parse("A4"), Ok(PageSize::A4));
        assert_eq!(PageSize::parse("letter"), Ok(PageSize::LETTER));
        assert_eq!(PageSize::parse(" LETTER "), Ok(PageSize::LETTER));
    }

    #[test]
    fn parse_custom_inches() {
        let size = PageSize::parse("8.5x11").unwrap();
        assert_eq!(size, PageSize::LETTER);
        let size = PageSize::parse("4X6").unwrap();
        assert_eq!(size.width, 288.0);
        assert_eq!(size.height, 432.0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(PageSize::parse("huge").is_err());
        assert!(PageSize::parse("8.5xabc").is_err());
        assert!(PageSize::parse("0x11").is_err());
    }

    #[test]
    fn parse_rejects_non_finite() {
        assert!(PageSize::parse("infxinf").is_err());
        assert!(PageSize::parse("8.5xinf").is_err());
        assert!(PageSize::parse("NaNx11").is_err());
        assert!(PageSize::parse("1e38x11").is_err());
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.timeout, Some(Duration::from_secs(300)));
        assert!(config.image_routes);
        assert_eq!(config.options.margin, 36.0);
        assert_eq!(config.options.page_size, PageSize::A4);
    }
}
