pub const BACKGROUND: &str = include_str!("../data/prompts/background.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// Wrap a user's scene description in the background framing template.
pub fn background_prompt(scene: &str) -> String {
    render(BACKGROUND, &[("prompt", scene)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_var() {
        assert_eq!(
            render("Hello {{name}}!", &[("name", "world")]),
            "Hello world!"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{{a}} and {{b}}", &[("a", "cats")]), "cats and {{b}}");
    }

    #[test]
    fn test_background_has_placeholder() {
        assert!(BACKGROUND.contains("{{prompt}}"));
    }

    #[test]
    fn test_background_prompt_wraps_scene() {
        let prompt = background_prompt("a minimalist home office with a plant");
        assert!(prompt.contains("The scene is: a minimalist home office with a plant."));
        assert!(prompt.contains("16:9"));
        assert!(prompt.contains("photorealistic"));
        assert!(prompt.contains("Avoid text and logos."));
        assert!(!prompt.contains("{{"));
    }
}
