/// Constants used throughout the StyleSync application
/// This module centralizes prompts and defaults for better maintainability

/// File extensions accepted as catalog images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Default OpenAI-compatible API base URL
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default vision model used for image labeling
pub const DEFAULT_VISION_MODEL: &str = "gpt-4-vision-preview";

/// Default chat model used for styling narration
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-turbo-preview";

/// Token cap for a single labeling reply
pub const LABEL_MAX_TOKENS: u32 = 500;

/// Token cap for a styling narration reply
pub const NARRATION_MAX_TOKENS: u32 = 300;

/// System prompt instructing the vision model to label one clothing image.
/// The reply must be a bare JSON object with exactly these five keys;
/// anything else (prose, code fences, missing keys) is a parse failure.
pub const LABEL_SYSTEM_PROMPT: &str = "\
You are a world-class fashion stylist.
You will receive an image of a clothing item.
Label the clothing by its description, category, gender, occasion and color.
Provide your output in JSON format with the 5 keys:
(1) description
(2) category
(3) gender
(4) occasion
(5) color

Here are the possible values for each key.
(1) description: a string of 10 to 20 words describing style (classic, modern, sporty, etc), colors, patterns (stripes, floral, etc) and accessories
(2) category: ['top', 'bottom', 'one-piece', 'outerwear', 'shoes', 'accessories', 'hats']
(3) gender: ['male', 'female', 'unisex']
(4) occasion: ['work', 'leisure', 'formal']
(5) color: ['red', 'green', 'blue', 'yellow', 'black', 'white', 'grey', 'brown', 'orange', 'purple', 'pink', 'multi-color']

Each key can ONLY contain one string value.

Always reply with one JSON object. No code block.
";

/// System prompt for the styling narration step
pub const STYLIST_SYSTEM_PROMPT: &str = "\
Your role is to be a trusted fashion stylist.
Given the context of the client's inputs, write a paragraph to explain the fashion choice by the client, and give context on what he or she might like.
Then explain the retrieved catalog items, unpack them, and help the client understand how he or she may like to wear the clothes.
Use a tone like a best friend to the client and keep it to a short paragraph.
For example:
These are the items you may like based on the style of your choice. The first item can be worn as leisure wear, featuring a white color that resonates with your dress's base tone. It could pair well with similar skirts or pants for a cohesive look.
The second and third items introduce multi-color options and can be worn as leisure wear or work wear. These choices suggest a blend of versatility and a subtle nod to your liking for floral or patterned designs.
";
