use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};

use crate::config::PageSize;
use crate::error::Error;
use crate::pdf::deflate;

/// A decoded raster flattened to 8-bit RGB and deflated, ready to become an image XObject.
pub(crate) struct RasterImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    rgb_deflated: Vec<u8>,
}

impl RasterImage {
    /// Alpha and palette images are flattened to plain RGB.
    pub(crate) fn decode(data: &[u8]) -> Result<Self, Error> {
        let rgb = image::load_from_memory(data)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::conversion("image has no pixels"));
        }
        Ok(Self {
            width,
            height,
            rgb_deflated: deflate(rgb.as_raw()),
        })
    }

    pub(crate) fn open(path: &std::path::Path) -> Result<Self, Error> {
        Self::decode(&std::fs::read(path)?)
    }

    pub(crate) fn write_xobject(&self, pdf: &mut Pdf, id: Ref) {
        let mut xobject = pdf.image_xobject(id, &self.rgb_deflated);
        xobject.filter(Filter::FlateDecode);
        xobject.width(self.width as i32);
        xobject.height(self.height as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.finish();
    }
}

/// Placement of a `w`×`h` image scaled to fit inside the page margins, centred.
/// Returns (x, y, width, height) in points.
pub(crate) fn fit_to_page(w: u32, h: u32, page: PageSize, margin: f32) -> (f32, f32, f32, f32) {
    let avail_w = (page.width - 2.0 * margin).max(1.0);
    let avail_h = (page.height - 2.0 * margin).max(1.0);
    let scale = (avail_w / w as f32).min(avail_h / h as f32);
    let final_w = w as f32 * scale;
    let final_h = h as f32 * scale;
    (
        (page.width - final_w) / 2.0,
        (page.height - final_h) / 2.0,
        final_w,
        final_h,
    )
}

/// One page per image, each scaled to fit and centred.
pub(crate) fn images_to_pdf(images: &[RasterImage], page: PageSize, margin: f32) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let pages_id = Ref::new(2);
    let mut next = 3;
    let mut alloc = || {
        let r = Ref::new(next);
        next += 1;
        r
    };

    let mut page_ids = Vec::with_capacity(images.len());
    for img in images {
        let page_id = alloc();
        let content_id = alloc();
        let image_id = alloc();
        page_ids.push(page_id);

        img.write_xobject(&mut pdf, image_id);

        let (x, y, w, h) = fit_to_page(img.width, img.height, page, margin);
        let mut content = Content::new();
        content.save_state();
        content.transform([w, 0.0, 0.0, h, x, y]);
        content.x_object(Name(b"Im1"));
        content.restore_state();
        pdf.stream(content_id, &deflate(&content.finish()))
            .filter(Filter::FlateDecode);

        let mut page_writer = pdf.page(page_id);
        page_writer
            .media_box(Rect::new(0.0, 0.0, page.width, page.height))
            .parent(pages_id)
            .contents(content_id);
        page_writer
            .resources()
            .x_objects()
            .pair(Name(b"Im1"), image_id);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);

    pdf.finish()
}
