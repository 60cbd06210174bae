use image::RgbImage;
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::ProcessError;

/// Wraps `image` in a one-page PDF, full bleed at 1 px = 1 pt.
pub fn image_to_pdf(image: &RgbImage) -> Result<Vec<u8>, ProcessError> {
    let (width, height) = image.dimensions();

    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let resources_id = doc.new_object_id();
    let content_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let image_id = doc.new_object_id();

    let mut image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        image.as_raw().clone(),
    );
    image_stream
        .compress()
        .map_err(|e| ProcessError::Composition(format!("Failed to compress image: {}", e)))?;
    doc.objects.insert(image_id, Object::Stream(image_stream));

    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "XObject" => dictionary! {
                "Im1" => image_id,
            },
        }),
    );

    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im1 Do\nQ\n", width, height);
    doc.objects.insert(
        content_id,
        Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
    );

    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        }),
    );

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ProcessError::Composition(format!("Failed to write PDF: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_single_page_sized_to_image() {
        let image = RgbImage::from_pixel(1300, 816, Rgb([255, 255, 255]));
        let bytes = image_to_pdf(&image).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box: Vec<i64> = page
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect();
        assert_eq!(media_box, vec![0, 0, 1300, 816]);
    }

    #[test]
    fn test_embeds_image_at_full_size() {
        let image = RgbImage::from_pixel(10, 6, Rgb([1, 2, 3]));
        let bytes = image_to_pdf(&image).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let image_stream = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| {
                s.dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map(|n| n == b"Image")
                    .unwrap_or(false)
            })
            .unwrap();
        assert_eq!(image_stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 10);
        assert_eq!(image_stream.dict.get(b"Height").unwrap().as_i64().unwrap(), 6);

        let content = doc
            .get_page_content(*doc.get_pages().values().next().unwrap())
            .unwrap();
        assert!(String::from_utf8_lossy(&content).contains("10 0 0 6 0 0 cm"));
    }

    #[test]
    fn test_output_is_reproducible() {
        let image = RgbImage::from_fn(20, 20, |x, y| Rgb([x as u8, y as u8, 0]));
        assert_eq!(image_to_pdf(&image).unwrap(), image_to_pdf(&image).unwrap());
    }
}
