#![cfg(unix)]

use cliodoc_exec::{CancellationWatcher, ExecutionContext, FixedEnvironment};
use cliodoc_program::{Program, Registry};
use cliodoc_render::{Delimiters, RenderError, RenderOptions, RenderTarget, Renderer};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

const ECHO: &str = r#"
name: echo
path: /bin/echo
args:
  - name: msg
    value: default
"#;

const FAIL: &str = r#"
name: fail
path: /bin/sh
rawFlags: ["-c", "echo partial; exit 3"]
"#;

const CAT: &str = r#"
name: cat
path: /bin/cat
"#;

fn registry() -> Registry {
    let mut registry = Registry::new();
    for yaml in [ECHO, FAIL, CAT] {
        let program = Program::from_yaml(yaml, "inline.yaml").unwrap();
        registry.insert(program, "inline.yaml").unwrap();
    }
    registry
}

fn renderer(options: RenderOptions, work: &Path) -> Renderer {
    let ctx = ExecutionContext::new(
        Arc::new(FixedEnvironment::new(work).inherit_path()),
        CancellationWatcher::never(),
    );
    Renderer::new(options.registry(registry()).verbose(false), ctx)
}

#[tokio::test]
async fn test_template_directive_is_replaced() {
    let work = tempdir().unwrap();
    let r = renderer(RenderOptions::new(), work.path());

    let out = r
        .render_text("before {{ run \"echo\" \"hello world\" }} after", Path::new("doc.md"))
        .await
        .unwrap();
    assert_eq!(out, "before hello world\n after");

    let out = r
        .render_text("{{ run \"echo\" }}", Path::new("doc.md"))
        .await
        .unwrap();
    assert_eq!(out, "default\n");
}

#[tokio::test]
async fn test_quoted_argument_may_contain_right_delimiter() {
    let work = tempdir().unwrap();
    let r = renderer(RenderOptions::new(), work.path());

    let out = r
        .render_text(r#"{{ run "echo" "a}}b" }}"#, Path::new("doc.md"))
        .await
        .unwrap();
    assert_eq!(out, "a}}b\n");
}

#[tokio::test]
async fn test_yaml_marker_block() {
    let work = tempdir().unwrap();
    let r = renderer(RenderOptions::new(), work.path());

    let text = "# Title\n<!-- cliodoc\nprogram: echo\nvalues:\n  msg: hi\n-->\nend\n";
    let out = r.render_text(text, Path::new("doc.md")).await.unwrap();
    assert_eq!(out, "# Title\nhi\nend\n");
}

#[tokio::test]
async fn test_output_is_not_rescanned() {
    let work = tempdir().unwrap();
    let r = renderer(RenderOptions::new(), work.path());

    let text = "<!-- cliodoc\nprogram: echo\nvalues:\n  msg: \"{{ run nope }}\"\n-->\n";
    let out = r.render_text(text, Path::new("doc.md")).await.unwrap();
    assert_eq!(out, "{{ run nope }}\n");
}

#[tokio::test]
async fn test_stdin_and_non_zero_exit() {
    let work = tempdir().unwrap();
    let r = renderer(RenderOptions::new(), work.path());

    let text = "<!-- cliodoc\nprogram: cat\nstdin: piped text\n-->\n{{ run fail }}";
    let out = r.render_text(text, Path::new("doc.md")).await.unwrap();
    assert_eq!(out, "piped textpartial\n");
}

#[tokio::test]
async fn test_disabled_syntaxes_stay_literal() {
    let work = tempdir().unwrap();
    let r = renderer(
        RenderOptions::new().with_template(false).with_yaml_markers(false),
        work.path(),
    );

    let text = "{{ run echo }}\n<!-- cliodoc\nprogram: echo\n-->\n";
    assert_eq!(r.render_text(text, Path::new("doc.md")).await.unwrap(), text);
}

#[tokio::test]
async fn test_custom_delimiters() {
    let work = tempdir().unwrap();
    let delimiters = Delimiters::from_list(&["<<", ">>"]).unwrap();
    let r = renderer(RenderOptions::new().delimiters(delimiters), work.path());

    let out = r
        .render_text("{{ literal }} <<run echo x>>", Path::new("doc.md"))
        .await
        .unwrap();
    assert_eq!(out, "{{ literal }} x\n");
}

#[tokio::test]
async fn test_unregistered_program_writes_nothing() {
    let work = tempdir().unwrap();
    let src = work.path().join("doc.tmpl.md");
    let out = work.path().join("out/doc.tmpl.md");
    fs::write(&src, "intro\n\n{{ run \"missing\" }}\n").unwrap();

    let r = renderer(RenderOptions::new(), work.path());
    match r.render_file(&src, &out).await {
        Err(RenderError::UnresolvedProgram { name, path, line }) => {
            assert_eq!(name, "missing");
            assert_eq!(path, src);
            assert_eq!(line, 3);
        }
        other => panic!("expected an unresolved program, got {other:?}"),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn test_inline_program_creation() {
    let work = tempdir().unwrap();
    let text = "<!-- cliodoc\nprogram:\n  name: greet\n  path: /bin/echo\n  rawFlags: [hello]\n-->\n{{ run shout path=/bin/echo loud }}";

    let denied = renderer(RenderOptions::new(), work.path());
    assert!(matches!(
        denied.render_text(text, Path::new("doc.md")).await,
        Err(RenderError::ProgramCreationDisabled { .. })
    ));

    let allowed = renderer(RenderOptions::new().allow_program_creation(true), work.path());
    let out = allowed.render_text(text, Path::new("doc.md")).await.unwrap();
    assert_eq!(out, "hello\nloud\n");
}

#[tokio::test]
async fn test_directory_is_mirrored() {
    let work = tempdir().unwrap();
    let src = work.path().join("a");
    let out = work.path().join("out");
    fs::create_dir_all(src.join("b")).unwrap();
    fs::create_dir_all(src.join(".hidden")).unwrap();
    fs::write(src.join("b/doc.tmpl.md"), "{{ run echo nested }}").unwrap();
    fs::write(src.join("top.tmpl.md"), "plain").unwrap();
    fs::write(src.join("notes.md"), "{{ run missing }}").unwrap();
    fs::write(src.join(".hidden/x.tmpl.md"), "{{ run missing }}").unwrap();

    let r = renderer(RenderOptions::new().jobs(2), work.path());
    let written = r.render_directory(&src, &out).await.unwrap();

    assert_eq!(
        written,
        vec![out.join("b/doc.tmpl.md"), out.join("top.tmpl.md")]
    );
    assert_eq!(fs::read_to_string(out.join("b/doc.tmpl.md")).unwrap(), "nested\n");
    assert_eq!(fs::read_to_string(out.join("top.tmpl.md")).unwrap(), "plain");
    assert!(!out.join("notes.md").exists());
}

#[tokio::test]
async fn test_render_paths_targets() {
    let work = tempdir().unwrap();
    let input = work.path().join("readme.tmpl.md");
    fs::write(&input, "v{{ run echo 1 }}").unwrap();
    let r = renderer(RenderOptions::new(), work.path());

    let out_dir = work.path().join("site");
    let written = r
        .render_paths(&[input.clone()], &RenderTarget::directory(&out_dir))
        .await
        .unwrap();
    assert_eq!(written, vec![out_dir.join("readme.tmpl.md")]);

    let out_file = work.path().join("README.md");
    r.render_paths(&[input.clone()], &RenderTarget::file(&out_file))
        .await
        .unwrap();
    assert_eq!(fs::read_to_string(out_file).unwrap(), "v1\n");

    let err = r
        .render_paths(
            &[input.clone(), PathBuf::from("other.md")],
            &RenderTarget::file(work.path().join("x.md")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::AmbiguousOutputFile { inputs: 2 }));
}
