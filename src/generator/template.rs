//! The landing-page prompt template.

/// Instructional wrapper for landing-page requirements. `%s` marks where the
/// requirements are substituted.
pub const LANDING_PAGE_TEMPLATE: &str = "\
Generate a modern, beautiful, professional, responsive landing page HTML using Tailwind CSS.
The page should be mobile-friendly and follow best practices.
Requirements: %s

Please provide only the HTML code without any explanations.
Use Tailwind CSS classes for styling.
Include proper meta tags and responsive design.
For images, use placeholder URLs from https://picsum.photos with appropriate dimensions.
Make sure the placeholder images match the theme and purpose of the landing page.
";

const PLACEHOLDER: &str = "%s";

/// Substitutes `requirements` into [`LANDING_PAGE_TEMPLATE`].
///
/// The requirements text is inserted verbatim; any `%s` it contains is left alone.
///
/// ```
/// use landing_forge::generator::render_landing_page_prompt;
///
/// let prompt = render_landing_page_prompt("A bakery in Lyon");
/// assert!(prompt.contains("\nRequirements: A bakery in Lyon\n"));
/// ```
pub fn render_landing_page_prompt(requirements: &str) -> String {
    LANDING_PAGE_TEMPLATE.replacen(PLACEHOLDER, requirements, 1)
}
