use reqwest::Url;
use std::path::{Path, PathBuf};

/// Last non-empty path segment of `url`, safe to be used as a file name.
pub fn file_name_from_url(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|x| x.filter(|y| !y.is_empty()).next_back())
        .unwrap_or("download");

    let name = name
        .chars()
        .map(|x| match x {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            x if x.is_control() => '_',
            x => x,
        })
        .collect::<String>();

    if name.trim_matches('.').is_empty() {
        "download".to_owned()
    } else {
        name
    }
}

/// Whether `template` gives different urls different names.
pub fn is_per_url_template(template: &str) -> bool {
    template.contains("{name}") || template.contains("{index}")
}

/// Replaces `{name}` and `{index}` inside an output template.
pub fn format_output(template: &str, url: &Url, index: usize) -> String {
    template
        .replace("{name}", &file_name_from_url(url))
        .replace("{index}", &index.to_string())
}

/// Returns a path which does not exist yet, `a.mp4` becomes `a (1).mp4`, `a (2).mp4`, etc.
/// The boolean tells whether `path` had to be changed.
pub fn free_file(path: PathBuf) -> (PathBuf, bool) {
    if !path.exists() {
        return (path, false);
    }

    let stem = path
        .file_stem()
        .map(|x| x.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path.extension().map(|x| x.to_string_lossy().to_string());
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut i = 1;
    loop {
        let name = match &extension {
            Some(extension) => format!("{} ({}).{}", stem, i, extension),
            None => format!("{} ({})", stem, i),
        };
        let candidate = parent.join(name);

        if !candidate.exists() {
            return (candidate, true);
        }

        i += 1;
    }
}
