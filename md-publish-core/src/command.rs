use crate::resolve::ResolvedParameters;

/// Flags md2conf always receives, in order.
pub const BEHAVIOUR_FLAGS: [&str; 3] = ["--keep-hierarchy", "--render-mermaid", "--heading-anchors"];

/// Builds the md2conf argument vector.
///
/// `converter` is the program and its leading arguments (`python3 -m md2conf`).
/// The flag order after it is fixed:
/// `-d -u -a -s [-r] --keep-hierarchy --render-mermaid --heading-anchors <path>`.
pub fn build(params: &ResolvedParameters, converter: &[String]) -> Vec<String> {
    let mut argv: Vec<String> = converter.to_vec();
    argv.extend([
        "-d".to_string(),
        params.domain().to_string(),
        "-u".to_string(),
        params.username().to_string(),
        "-a".to_string(),
        params.api_key().to_string(),
        "-s".to_string(),
        params.space().to_string(),
    ]);
    if let Some(root_page) = params.root_page() {
        argv.push("-r".to_string());
        argv.push(root_page.to_string());
    }
    argv.extend(BEHAVIOUR_FLAGS.iter().map(|f| f.to_string()));
    argv.push(params.markdown_path().to_string_lossy().into_owned());
    argv
}

/// Command line for logs, with the API key masked.
pub fn redacted(argv: &[String]) -> String {
    let mut out = Vec::with_capacity(argv.len());
    let mut mask_next = false;
    for arg in argv {
        if mask_next {
            out.push("****");
            mask_next = false;
        } else {
            mask_next = arg == "-a";
            out.push(arg.as_str());
        }
    }
    out.join(" ")
}
