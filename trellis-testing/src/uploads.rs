// Uploaded file normalisation

use crate::error::{Result, TestingError};
use std::collections::BTreeMap;
use trellis_core::{FileNode, UploadedFile, UploadedFiles};

/// Split a form field name such as `docs[a][0]` into `["docs", "a", "0"]`.
///
/// An empty bracket pair (`photos[]`) yields an empty segment, which is
/// later replaced by the next free numeric index. Names that do not follow
/// the bracket syntax are used verbatim.
pub fn field_path(name: &str) -> Vec<String> {
    let Some(open) = name.find('[') else {
        return vec![name.to_string()];
    };
    if open == 0 {
        return vec![name.to_string()];
    }

    let mut segments = vec![name[..open].to_string()];
    let mut rest = &name[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        match inner.find(']') {
            Some(close) => {
                segments.push(inner[..close].to_string());
                rest = &inner[close + 1..];
            }
            None => return vec![name.to_string()],
        }
    }
    if !rest.is_empty() {
        return vec![name.to_string()];
    }
    segments
}

/// Build the uploaded-file tree from `(field name, file)` pairs.
///
/// Later pairs replace earlier files at the same position. A position that
/// is used both for a file and for a nested group is rejected.
pub fn normalize<I, S>(files: I) -> Result<UploadedFiles>
where
    I: IntoIterator<Item = (S, UploadedFile)>,
    S: AsRef<str>,
{
    let mut tree: UploadedFiles = BTreeMap::new();
    for (name, file) in files {
        let name = name.as_ref();
        let path = field_path(name);
        insert(&mut tree, &path, file, name)?;
    }
    Ok(tree)
}

fn insert(
    group: &mut BTreeMap<String, FileNode>,
    path: &[String],
    file: UploadedFile,
    field: &str,
) -> Result<()> {
    let Some((head, tail)) = path.split_first() else {
        return Err(TestingError::ConflictingUpload(field.to_string()));
    };
    let key = if head.is_empty() {
        next_index(group)
    } else {
        head.clone()
    };

    if tail.is_empty() {
        return match group.get(&key) {
            Some(FileNode::Group(_)) => Err(TestingError::ConflictingUpload(field.to_string())),
            _ => {
                group.insert(key, FileNode::File(file));
                Ok(())
            }
        };
    }

    match group
        .entry(key)
        .or_insert_with(|| FileNode::Group(BTreeMap::new()))
    {
        FileNode::Group(children) => insert(children, tail, file, field),
        FileNode::File(_) => Err(TestingError::ConflictingUpload(field.to_string())),
    }
}

fn next_index(group: &BTreeMap<String, FileNode>) -> String {
    group
        .keys()
        .filter_map(|k| k.parse::<usize>().ok())
        .max()
        .map_or(0, |max| max + 1)
        .to_string()
}
