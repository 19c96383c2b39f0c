use soyc_ast::parse_template;
use soyc_ast::HtmlTag;
use soyc_ast::NodeId;
use soyc_ast::Tree;
use soyc_conf::DiagnosticsConfig;
use soyc_conf::Settings;
use soyc_html::check_html_tags;
use soyc_html::check_html_tags_with;
use soyc_html::check_html_tags_with_settings;
use soyc_html::render_diagnostics;
use soyc_html::DiagnosticSink;
use soyc_html::HtmlTagError;
use soyc_source::DiagnosticRenderer;
use soyc_source::SourceFile;

fn check(source: &str) -> (Tree, Vec<HtmlTagError>) {
    let mut tree = parse_template(source).unwrap();
    let errors = check_html_tags(&mut tree);
    (tree, errors)
}

fn rendered(source: &str) -> String {
    let (tree, errors) = check(source);
    assert!(errors.is_empty(), "unexpected diagnostics: {errors:?}");
    tree.render()
}

fn codes(source: &str) -> Vec<&'static str> {
    check(source)
        .1
        .iter()
        .map(HtmlTagError::diagnostic_code)
        .collect()
}

fn messages(source: &str) -> String {
    check(source)
        .1
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn tags(tree: &Tree) -> Vec<NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .filter(|id| tree.html_tag(*id).is_some())
        .collect()
}

fn synthetic_count(tree: &Tree) -> usize {
    tags(tree)
        .into_iter()
        .filter(|id| tree.html_tag(*id).is_some_and(HtmlTag::is_synthetic))
        .count()
}

fn paired(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    tree.html_tag(id).map(|tag| tag.paired.clone()).unwrap_or_default()
}

#[test]
fn balanced_input_is_left_alone() {
    for source in [
        "<div><p>x</p><ul><li>a</li></ul></div>",
        "{if $a}<b>x</b>{else}<i>y</i>{/if}",
        "<table><tr><td>1</td></tr></table>",
        "{msg desc=\"d\"}<a href=\"#\">x</a>{/msg}",
    ] {
        let (tree, errors) = check(source);
        assert!(errors.is_empty(), "{source}: {errors:?}");
        assert_eq!(tree.render(), source);
        assert_eq!(synthetic_count(&tree), 0);
    }
}

#[test]
fn second_run_changes_nothing() {
    let mut tree = parse_template("<ul><li>A<li>B</ul><p>end").unwrap();
    assert!(check_html_tags(&mut tree).is_empty());
    let first = tree.render();
    let synthetic = synthetic_count(&tree);

    assert!(check_html_tags(&mut tree).is_empty());
    assert_eq!(tree.render(), first);
    assert_eq!(synthetic_count(&tree), synthetic);
}

#[test]
fn void_elements_reject_close_tags() {
    assert_eq!(codes("<br></br>"), vec!["H101"]);
    assert_eq!(codes("<img src=x>"), Vec::<&str>::new());
    assert_eq!(
        messages("<input></input>"),
        "'input' tag is a void element and must not specify a close tag."
    );
}

#[test]
fn self_closing_needs_void_or_foreign_content() {
    assert_eq!(codes("<br/><img/>"), Vec::<&str>::new());
    assert_eq!(codes("<div/>"), vec!["H100"]);
    assert_eq!(
        messages("<span/>"),
        "'span' tag is not allowed to be self-closing."
    );
}

#[test]
fn foreign_content_allows_self_closing() {
    assert_eq!(
        codes("<svg><path d=\"M0\"/><circle/></svg><math><mi/></math>"),
        Vec::<&str>::new()
    );
    assert_eq!(codes("<svg/>"), Vec::<&str>::new());
    assert_eq!(codes("<svg></svg><g/>"), vec!["H100"]);
    assert_eq!(
        codes("<svg>{msg desc=\"d\"}<path/>{/msg}</svg>"),
        Vec::<&str>::new()
    );
}

#[test]
fn optional_tags_close_implicitly() {
    assert_eq!(rendered("<li>A<li>B</li>"), "<li>A</li><li>B</li>");
    assert_eq!(rendered("<ul><li>A<li>B</ul>"), "<ul><li>A</li><li>B</li></ul>");
    assert_eq!(rendered("<p>one<p>two"), "<p>one</p><p>two</p>");
    assert_eq!(rendered("<p>x<div>y</div>"), "<p>x</p><div>y</div>");
    assert_eq!(rendered("<p>x<a>y</a></p>"), "<p>x<a>y</a></p>");
}

#[test]
fn synthetic_closes_are_paired_both_ways() {
    let (tree, errors) = check("<ul><li>A</ul>");
    assert!(errors.is_empty());

    let &[ul, li, close_li, close_ul] = &tags(&tree)[..] else {
        panic!("expected four tags");
    };
    assert!(tree.html_tag(close_li).is_some_and(HtmlTag::is_synthetic));
    assert!(tree.span(close_li).is_empty());
    assert_eq!(paired(&tree, li), vec![close_li]);
    assert_eq!(paired(&tree, close_li), vec![li]);
    assert_eq!(paired(&tree, ul), vec![close_ul]);
}

#[test]
fn nested_optional_tags_close_innermost_first() {
    assert_eq!(
        rendered("<table><tr><td>x</table>"),
        "<table><tr><td>x</td></tr></table>"
    );
    assert_eq!(
        rendered("<ul><li><p>x</ul>"),
        "<ul><li><p>x</p></li></ul>"
    );
    assert_eq!(
        rendered("<dl><dt>a<dd>b<dt>c</dl>"),
        "<dl><dt>a</dt><dd>b</dd><dt>c</dt></dl>"
    );
    assert_eq!(
        rendered("<table><thead><tr><th>h<tbody><tr><td>1<td>2</table>"),
        "<table><thead><tr><th>h</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
    );
}

#[test]
fn optional_tags_left_open_close_at_the_end() {
    assert_eq!(rendered("<p>text"), "<p>text</p>");
    assert_eq!(
        rendered("<ul>{for $x in $xs}<li>{$x}{/for}</ul>"),
        "<ul>{for $x in $xs}<li>{$x}</li>{/for}</ul>"
    );
}

#[test]
fn repeated_condition_is_correlated() {
    let (tree, errors) = check("{if $c}<div>{/if}{if $c}</div>{/if}");
    assert!(errors.is_empty(), "{errors:?}");

    let &[open, close] = &tags(&tree)[..] else {
        panic!("expected two tags");
    };
    assert_eq!(paired(&tree, open), vec![close]);
    assert_eq!(paired(&tree, close), vec![open]);
}

#[test]
fn different_conditions_are_independent() {
    let source = "{if $c}<div>{/if}{if $d}</div>{/if}";
    assert_eq!(codes(source), vec!["H102", "H105"]);
    insta::assert_snapshot!(messages(source), @r"
    Unexpected HTML close tag.
    This HTML open tag does not consistently match with a close tag.
    ");
}

#[test]
fn structurally_equal_conditions_correlate() {
    assert_eq!(
        codes("{if $a.b == 1}<div>{/if}x{if $a.b == 1}</div>{/if}"),
        Vec::<&str>::new()
    );
    assert_eq!(
        codes("{if not $a}<span>{else}<b>{/if}{if not $a}</span>{else}</b>{/if}"),
        Vec::<&str>::new()
    );
}

#[test]
fn switch_cases_correlate() {
    assert_eq!(
        codes("{switch $k}{case 1}<b>{default}<i>{/switch}x{switch $k}{case 1}</b>{default}</i>{/switch}"),
        Vec::<&str>::new()
    );
    assert_eq!(
        codes("{switch $k}{case 1}<b>{default}<i>{/switch}x{switch $k}{case 2}</b>{default}</i>{/switch}"),
        vec!["H103", "H103", "H105", "H105"]
    );
}

#[test]
fn branches_start_from_the_same_stack() {
    assert_eq!(codes("{if $c}<b>{else}</b>{/if}"), vec!["H102", "H104"]);
    assert_eq!(codes("<div>{if $c}</div>{else}</div>{/if}"), Vec::<&str>::new());
}

#[test]
fn balanced_branch_still_reaches_the_join() {
    assert_eq!(codes("{if $c}{else}<div>{/if}</div>"), vec!["H102"]);
    assert_eq!(codes("{if $c}<b></b>{else}<div>{/if}</div>"), vec!["H102"]);
    assert_eq!(
        codes("{if $c}<div>{/if}{if $c}<b></b>{else}</div>{/if}"),
        vec!["H102", "H104"]
    );

    let mut unbalanced = codes("{if $c}<b>{else}</div>{/if}");
    unbalanced.dedup();
    assert_eq!(unbalanced, vec!["H102", "H104"]);
}

#[test]
fn closing_on_some_paths_only_is_inconsistent() {
    assert_eq!(codes("<div>{if $c}</div>{/if}"), vec!["H105"]);
}

#[test]
fn unexpected_close_tags() {
    assert_eq!(codes("</div>"), vec!["H102"]);
    assert_eq!(codes("<div></div></div>"), vec!["H102"]);
    insta::assert_snapshot!(messages("<div>\n  <span>\n</div>"), @r"
    Unexpected HTML close tag. Expected to match the '<span>' at 2:3.
    This HTML open tag is never matched with a close tag.
    This HTML open tag is never matched with a close tag.
    ");
}

#[test]
fn excluded_optional_closes_need_no_open() {
    assert_eq!(codes("<html><body>x</body></html></body>"), Vec::<&str>::new());
    assert_eq!(
        rendered("<table><tr><td>x</tbody></table>"),
        "<table><tr><td>x</td></tr></tbody></table>"
    );
}

#[test]
fn dynamic_names() {
    assert_eq!(codes("<{$t}>x</{$t}>"), Vec::<&str>::new());
    assert_eq!(codes("<{$t}>x</{$u}>"), Vec::<&str>::new());
    assert_eq!(codes("<div>x</{$t}>"), vec!["H106"]);
    assert_eq!(
        messages("<div>x</{$t}>"),
        "Expected an html tag name."
    );
    assert_eq!(codes("<{$t}>x</div>"), vec!["H103", "H104"]);
}

#[test]
fn dynamic_close_still_closes_a_static_open() {
    assert_eq!(codes("<div>{if $c}</{$t}>{/if}"), vec!["H106", "H105"]);

    let (tree, _) = check("<div>x</{$t}>");
    let &[open, close] = &tags(&tree)[..] else {
        panic!("expected two tags");
    };
    assert_eq!(paired(&tree, open), vec![close]);
}

#[test]
fn blocks_must_balance_on_their_own() {
    insta::assert_snapshot!(messages("{msg desc=\"d\"}<b>{/msg}"), @"This HTML open tag is never matched with a close tag. Tags within a msg must be internally balanced.");
    assert_eq!(codes("<div>{msg desc=\"d\"}</div>{/msg}"), vec!["H102", "H104"]);
    assert_eq!(
        messages("{for $x in $xs}</div>{/for}"),
        "Unexpected HTML close tag. Tags within a for must be internally balanced."
    );
    assert_eq!(
        codes("{call .row}{param body kind=\"html\"}<td>x</td>{/param}{/call}"),
        Vec::<&str>::new()
    );
    assert_eq!(
        codes("{call .row}{param body kind=\"html\"}<tr>{/param}{/call}"),
        Vec::<&str>::new()
    );
    assert_eq!(
        codes("{call .row}{param body kind=\"html\"}<div>{/param}{/call}"),
        vec!["H104"]
    );
}

#[test]
fn block_inside_branch_reports_once() {
    assert_eq!(
        codes("{if $a}<div>{/if}{msg desc=\"d\"}<b>{/msg}{if $a}</div>{/if}"),
        vec!["H104"]
    );
}

#[test]
fn long_correlated_chain_terminates() {
    let source = format!(
        "{}{}",
        "{if $c}<div>{/if}".repeat(300),
        "{if $c}</div>{/if}".repeat(300)
    );
    let (tree, errors) = check(&source);
    assert!(errors.is_empty());
    assert!(tags(&tree).iter().all(|id| paired(&tree, *id).len() == 1));
}

#[test]
fn long_chain_of_balanced_conditions() {
    let source: String = (0..1000).map(|i| format!("{{if $c{i}}}<b>x</b>{{/if}}")).collect();
    let (tree, errors) = check(&source);
    assert!(errors.is_empty());
    assert_eq!(tags(&tree).len(), 2000);
    assert!(tags(&tree).iter().all(|id| paired(&tree, *id).len() == 1));
}

#[test]
fn many_independent_correlated_pairs() {
    let source: String = (0..500)
        .map(|i| format!("{{if $c{i}}}<div>{{/if}}{{if $c{i}}}</div>{{/if}}"))
        .collect();
    let (_, errors) = check(&source);
    assert!(errors.is_empty());
}

fn nested_correlated(depth: usize) -> String {
    let opens: String = (0..depth)
        .map(|i| format!("{{if $c{i}}}<div>{{/if}}"))
        .collect();
    let closes: String = (0..depth)
        .rev()
        .map(|i| format!("{{if $c{i}}}</div>{{/if}}"))
        .collect();
    format!("{opens}{closes}")
}

#[test]
fn nested_correlated_conditions() {
    assert_eq!(codes(&nested_correlated(6)), Vec::<&str>::new());
}

#[test]
fn path_explosion_is_cut_off() {
    assert_eq!(codes(&nested_correlated(30)), vec!["H107"]);
    insta::assert_snapshot!(
        messages(&nested_correlated(30)),
        @"Too many distinct control flow paths; HTML tags were only matched on some of them."
    );
}

#[test]
fn deep_markup() {
    let source = format!("{}{}", "<div>".repeat(5000), "</div>".repeat(5000));
    let (_, errors) = check(&source);
    assert!(errors.is_empty());
}

#[test]
fn custom_sink_receives_every_diagnostic() {
    #[derive(Default)]
    struct Codes(Vec<&'static str>);

    impl DiagnosticSink for Codes {
        fn report(&mut self, error: HtmlTagError) {
            self.0.push(error.diagnostic_code());
        }
    }

    let mut tree = parse_template("<div/></br></span>").unwrap();
    let mut sink = Codes::default();
    check_html_tags_with(&mut tree, &mut sink);

    assert_eq!(sink.0, vec!["H100", "H101", "H102"]);
}

#[test]
fn project_settings_filter_diagnostics() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(
        project.path().join("soyc.toml"),
        "[diagnostics.severity]\nH105 = \"off\"\n",
    )
    .unwrap();
    let settings = Settings::new(project.path()).unwrap();

    let mut tree = parse_template("{if $c}<div>{/if}{if $d}</div>{/if}").unwrap();
    let errors = check_html_tags_with_settings(&mut tree, &settings);

    assert_eq!(
        errors
            .iter()
            .map(HtmlTagError::diagnostic_code)
            .collect::<Vec<_>>(),
        vec!["H102"]
    );
}

#[test]
fn rendered_diagnostics_point_at_source() {
    let source = "<ul>\n  <li>a\n</div>\n";
    let (_, errors) = check(source);
    let output = render_diagnostics(
        &SourceFile::new("templates/list.soy", source),
        &errors,
        &DiagnosticsConfig::default(),
        &DiagnosticRenderer::plain(),
    );

    assert_eq!(output.len(), 3);
    assert!(output[0].contains("error[H103]"));
    assert!(output[0].contains("templates/list.soy"));
    assert!(output[0].contains("Expected to match the '<li>' at 2:3."));
    assert!(output[1].contains("error[H104]"));
}
