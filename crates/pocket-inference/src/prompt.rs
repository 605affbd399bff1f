//! Categorization prompt construction.

use pocket_core::{
    clip_chars,
    defaults::{CORRECTION_QUOTE_CHARS, RETRY_CONTENT_CHARS, RETRY_FOLDER_LIMIT},
    UserCorrection,
};

/// What the model is asked to file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSubject<'a> {
    /// A text note.
    Text(&'a str),
    /// An image attached to the request as inline data.
    Image,
}

/// Everything that goes into a categorization prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub subject: PromptSubject<'a>,
    pub folders: &'a [String],
    pub corrections: &'a [UserCorrection],
}

impl<'a> PromptInput<'a> {
    /// Reduced input for the retry after an empty or truncated answer:
    /// content clipped, folder list clipped, corrections dropped.
    pub fn shortened(&self) -> PromptInput<'a> {
        let subject = match self.subject {
            PromptSubject::Text(content) => {
                PromptSubject::Text(clip_chars(content, RETRY_CONTENT_CHARS))
            }
            PromptSubject::Image => PromptSubject::Image,
        };
        let folder_count = self.folders.len().min(RETRY_FOLDER_LIMIT);

        PromptInput {
            subject,
            folders: &self.folders[..folder_count],
            corrections: &[],
        }
    }
}

const ANSWER_FORMAT: &str = r#"Return ONLY a compact JSON object with exactly these keys and types:
{
  "category": string,
  "confidence": number,  // 0..1
  "reasoning": string,
  "alternatives": string[]
}
No extra text, no code fences."#;

/// Build the categorization prompt.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = match input.subject {
        PromptSubject::Text(content) => format!(
            "Analyze this content and suggest the most appropriate category/folder name for \
             organizing it.\n\nContent to categorize: \"{}\"\n\n",
            content
        ),
        PromptSubject::Image => "Analyze the attached image and suggest the most appropriate \
                                 category/folder name for organizing it.\n\n"
            .to_string(),
    };

    if !input.folders.is_empty() {
        prompt.push_str(&format!(
            "Refer these existing categories/folders for more context: {}\n\n",
            input.folders.join(", ")
        ));
    }

    if !input.corrections.is_empty() {
        prompt.push_str("User's past corrections (learn from these patterns):\n");
        let lines: Vec<String> = input
            .corrections
            .iter()
            .map(|c| {
                format!(
                    "\"{}...\" → suggested: \"{}\" → user chose: \"{}\"",
                    clip_chars(&c.original_content, CORRECTION_QUOTE_CHARS),
                    c.suggested_folder,
                    c.accepted_folder
                )
            })
            .collect();
        prompt.push_str(&lines.join("\n"));
        prompt.push_str("\n\n");
    }

    prompt.push_str(ANSWER_FORMAT);
    prompt
}
