//! Server-rendered page for the interactive session.
//!
//! Every interaction re-renders the whole page from the request alone; nothing
//! is kept between requests.

use std::fmt::Write as _;

use crate::{
    core::{
        model::ModelState,
        scoring::{ScoreResult, DESCRIPTION_COUNT},
        upload::{UploadedImage, ACCEPTED_EXTENSIONS},
    },
    utils::escape_html,
};

pub(crate) const TITLE: &str = "Image understanding model test";
pub(crate) const MODEL_FAILED_BANNER: &str = "⚠️ Model failed to load. Please check the logs.";
pub(crate) const EMPTY_DESCRIPTIONS_WARNING: &str = "Please fill in all three descriptions!";

const PLACEHOLDERS: [&str; DESCRIPTION_COUNT] = [
    "A red apple",
    "A car parked in a garage",
    "An orange fruit on a tree",
];

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; color: #262730; }
img.preview { max-width: 100%; border-radius: 4px; }
figcaption { color: #808495; font-size: 0.9rem; }
label { display: block; margin-top: 0.8rem; }
input[type=text] { width: 100%; padding: 0.4rem; box-sizing: border-box; }
button { margin-top: 1rem; padding: 0.4rem 1.2rem; }
progress { width: 100%; height: 1rem; }
.notice { padding: 0.8rem 1rem; border-radius: 4px; margin: 1rem 0; }
.error { background: #fde0e0; color: #7d1a1a; }
.warning { background: #fff6d6; color: #6b5300; }
#spinner { display: none; }
"#;

#[derive(Debug)]
pub(crate) enum Notice {
    Error(String),
    Warning(String),
}

/// Everything one render of the page needs.
#[derive(Debug)]
pub(crate) struct Page<'a> {
    model: &'a ModelState,
    pub(crate) image: Option<UploadedImage>,
    pub(crate) descriptions: [String; DESCRIPTION_COUNT],
    pub(crate) result: Option<ScoreResult>,
    notices: Vec<Notice>,
}

impl<'a> Page<'a> {
    pub(crate) fn new(model: &'a ModelState) -> Self {
        Self {
            model,
            image: None,
            descriptions: Default::default(),
            result: None,
            notices: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.notices.push(Notice::Error(message.into()));
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.notices.push(Notice::Warning(message.into()));
    }

    pub(crate) fn render(&self) -> String {
        let mut html = String::with_capacity(4096);
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n<h1>{title}</h1>\n",
            title = TITLE,
            style = STYLE,
        );

        if let Some(reason) = self.model.unavailable_reason() {
            push_notice(&mut html, &Notice::Error(format!("Failed to load CLIP model: {}", reason)));
            push_notice(&mut html, &Notice::Error(MODEL_FAILED_BANNER.to_string()));
            html.push_str("</body>\n</html>\n");
            return html;
        }

        html.push_str("<hr>\n<h3>Upload an image to test how well the model understands it</h3>\n");
        self.render_upload_form(&mut html);

        if let Some(image) = &self.image {
            self.render_descriptions_form(&mut html, image);
        }

        for notice in &self.notices {
            push_notice(&mut html, notice);
        }

        if let Some(result) = &self.result {
            render_result(&mut html, result);
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    fn render_upload_form(&self, html: &mut String) {
        let accept: Vec<String> = ACCEPTED_EXTENSIONS.iter().map(|ext| format!(".{}", ext)).collect();
        let _ = write!(
            html,
            "<form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
             <label for=\"image\">Upload an image...</label>\n\
             <input id=\"image\" type=\"file\" name=\"image\" accept=\"{accept},image/jpeg,image/png\" required>\n\
             <button type=\"submit\">Upload</button>\n</form>\n",
            accept = accept.join(","),
        );
    }

    fn render_descriptions_form(&self, html: &mut String, image: &UploadedImage) {
        let _ = write!(
            html,
            "<figure>\n<img class=\"preview\" src=\"{src}\" alt=\"Uploaded image\">\n\
             <figcaption>Uploaded Image.</figcaption>\n</figure>\n\
             <h3>2 Lies and 1 Truth</h3>\n\
             <p>Write 3 descriptions about the image, 1 must be true.</p>\n\
             <form action=\"/predict\" method=\"post\" enctype=\"multipart/form-data\" \
             onsubmit=\"document.getElementById('spinner').style.display='block'\">\n\
             <input type=\"hidden\" name=\"image_name\" value=\"{name}\">\n\
             <input type=\"hidden\" name=\"image_data\" value=\"{data}\">\n",
            src = image.data_url(),
            name = escape_html(image.file_name()),
            data = image.to_base64(),
        );

        for (i, placeholder) in PLACEHOLDERS.iter().enumerate() {
            let _ = write!(
                html,
                "<label for=\"description_{n}\">Description {n}:</label>\n\
                 <input id=\"description_{n}\" type=\"text\" name=\"description_{n}\" \
                 placeholder=\"{placeholder}\" value=\"{value}\">\n",
                n = i + 1,
                placeholder = placeholder,
                value = escape_html(&self.descriptions[i]),
            );
        }

        html.push_str(
            "<button type=\"submit\">Predict</button>\n\
             <p id=\"spinner\">Making prediction...</p>\n</form>\n",
        );
    }
}

fn push_notice(html: &mut String, notice: &Notice) {
    let (class, message) = match notice {
        Notice::Error(m) => ("error", m),
        Notice::Warning(m) => ("warning", m),
    };
    let _ = writeln!(
        html,
        "<div class=\"notice {}\" role=\"alert\">{}</div>",
        class,
        escape_html(message)
    );
}

fn render_result(html: &mut String, result: &ScoreResult) {
    let _ = write!(
        html,
        "<section id=\"result\">\n\
         <p><strong>Best Description:</strong> {description}</p>\n\
         <p><strong>Prediction Probability:</strong> {percent}</p>\n",
        description = escape_html(&result.best_description),
        percent = result.confidence_percent(),
    );

    if result.has_bounded_confidence() {
        let _ = writeln!(
            html,
            "<progress max=\"1\" value=\"{:.4}\">{}</progress>",
            result.confidence,
            result.confidence_percent()
        );
    }

    html.push_str("</section>\n");
}
