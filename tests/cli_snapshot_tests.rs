//! Snapshot tests for CLI output using insta.
//!
//! To update snapshots after intentional changes:
//! ```bash
//! cargo insta test --accept
//! ```

#[allow(dead_code)]
mod common;
use common::TestRepo;

/// Replace the repository path and strip trailing whitespace for stable
/// snapshots.
fn normalize_output(output: &[u8], repo: &TestRepo) -> String {
    let root = repo.path().canonicalize().unwrap();
    String::from_utf8_lossy(output)
        .replace(root.to_str().unwrap(), "[REPO]")
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_eol_without_attributes_snapshot() {
    let repo = TestRepo::new().with_file("a.txt", "a\n").with_commit("init");
    let output = repo.command().arg("eol").output().unwrap();

    insta::assert_snapshot!(normalize_output(&output.stdout, &repo), @r"
    [RUN] Configuring line endings in [REPO]
    [INFO] No .gitattributes found; line-ending settings left as they are
    [SET] core.safecrlf = true (was unset)
    [OK] Line endings are consistent; no files renormalized
    ");
}

#[test]
fn test_commit_dry_run_snapshot() {
    let repo = TestRepo::new().with_file("a.txt", "a\n");
    let output = repo
        .command()
        .args(["--dry-run", "commit", "-m", "init"])
        .output()
        .unwrap();

    insta::assert_snapshot!(normalize_output(&output.stdout, &repo), @r"
    [RUN] Committing . in [REPO]
    [DRY-RUN] DRY RUN MODE - No changes will be made
    [DRY-RUN] Would run: git add -A -- .
    [DRY-RUN] Would run: git commit -m init
    [OK] Committed
    ");
}

#[test]
fn test_submodule_dry_run_snapshot() {
    let upstream = TestRepo::new().with_file("lib.c", "int x;\n").with_commit("upstream");
    let repo = TestRepo::new().with_file("README.md", "super\n").with_commit("init");
    let url = upstream.path().to_str().unwrap().to_string();
    let output = repo
        .command()
        .args(["--dry-run", "submodule", &url, "vendor/lib", "--name", "lib"])
        .output()
        .unwrap();

    let normalized = normalize_output(&output.stdout, &repo).replace(&url, "[URL]");
    insta::assert_snapshot!(normalized, @r"
    [RUN] Provisioning submodule vendor/lib from [URL]
    [DRY-RUN] DRY RUN MODE - No changes will be made
    [DRY-RUN] Would run: git submodule add --name lib -- [URL] vendor/lib
    [DRY-RUN] Would run: git config -f .gitmodules submodule.lib.path vendor/lib
    [DRY-RUN] Would run: git config -f .gitmodules submodule.lib.url [URL]
    [DRY-RUN] Would run: git submodule update --init -- vendor/lib
    [DRY-RUN] Would run: git add -- .gitmodules vendor/lib
    [DRY-RUN] Would run: git commit -m Add submodule lib at vendor/lib -- .gitmodules vendor/lib
    [SUBMODULE] Registered submodule 'lib' at vendor/lib
       url: [URL]
       branch: (remote default)
    [OK] Committed
    ");
}
