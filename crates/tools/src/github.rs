//! Static catalog of the GitHub MCP server's repository tools.
//!
//! Used until (or instead of) discovery via `tools/list`. Only the tools a
//! remediation run needs are declared; discovery replaces the whole set.

use remedy_core::provider::ToolDefinition;
use remedy_core::tool::ToolCatalog;
use serde_json::json;

fn owner_repo() -> serde_json::Value {
    json!({
        "owner": { "type": "string", "description": "Repository owner (user or organization)" },
        "repo": { "type": "string", "description": "Repository name" }
    })
}

fn schema(extra: serde_json::Value, required: &[&str]) -> serde_json::Value {
    let mut properties = owner_repo();
    if let (Some(base), Some(more)) = (properties.as_object_mut(), extra.as_object()) {
        base.extend(more.clone());
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn def(name: &str, description: &str, parameters: serde_json::Value) -> ToolDefinition {
    ToolDefinition {
        name: name.into(),
        description: description.into(),
        parameters,
    }
}

/// The repository operations a remediation run relies on.
pub fn github_catalog() -> ToolCatalog {
    let mut catalog = ToolCatalog::new();

    catalog.register(def(
        "get_file_contents",
        "Get the contents of a file or directory from a GitHub repository",
        schema(
            json!({
                "path": { "type": "string", "description": "Path to the file or directory" },
                "branch": { "type": "string", "description": "Branch to read from" }
            }),
            &["owner", "repo", "path"],
        ),
    ));

    catalog.register(def(
        "search_code",
        "Search for code across GitHub repositories",
        json!({
            "type": "object",
            "properties": {
                "q": { "type": "string", "description": "Search query using GitHub code search syntax" }
            },
            "required": ["q"]
        }),
    ));

    catalog.register(def(
        "list_commits",
        "Get the list of commits of a branch in a GitHub repository",
        schema(
            json!({ "sha": { "type": "string", "description": "Branch name or commit SHA" } }),
            &["owner", "repo"],
        ),
    ));

    catalog.register(def(
        "list_branches",
        "List branches in a GitHub repository",
        schema(json!({}), &["owner", "repo"]),
    ));

    catalog.register(def(
        "create_branch",
        "Create a new branch in a GitHub repository",
        schema(
            json!({
                "branch": { "type": "string", "description": "Name for the new branch" },
                "from_branch": { "type": "string", "description": "Source branch (defaults to the repository default)" }
            }),
            &["owner", "repo", "branch"],
        ),
    ));

    catalog.register(def(
        "create_or_update_file",
        "Create or update a single file in a GitHub repository",
        schema(
            json!({
                "path": { "type": "string", "description": "Path where to create or update the file" },
                "content": { "type": "string", "description": "Full new content of the file" },
                "message": { "type": "string", "description": "Commit message" },
                "branch": { "type": "string", "description": "Branch to commit to" },
                "sha": { "type": "string", "description": "Blob SHA of the file being replaced (required for updates)" }
            }),
            &["owner", "repo", "path", "content", "message", "branch"],
        ),
    ));

    catalog.register(def(
        "push_files",
        "Push multiple files to a GitHub repository in a single commit",
        schema(
            json!({
                "branch": { "type": "string", "description": "Branch to push to" },
                "message": { "type": "string", "description": "Commit message" },
                "files": {
                    "type": "array",
                    "description": "Files to push",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "content": { "type": "string" }
                        },
                        "required": ["path", "content"]
                    }
                }
            }),
            &["owner", "repo", "branch", "files", "message"],
        ),
    ));

    catalog.register(def(
        "create_pull_request",
        "Create a new pull request in a GitHub repository",
        schema(
            json!({
                "title": { "type": "string", "description": "PR title" },
                "body": { "type": "string", "description": "PR description" },
                "head": { "type": "string", "description": "Branch containing the changes" },
                "base": { "type": "string", "description": "Branch to merge into" }
            }),
            &["owner", "repo", "title", "head", "base"],
        ),
    ));

    catalog
}
