use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mrgit::git::command::split_command_line;
use mrgit::git::parser::{parse_branches, parse_remotes, parse_stash_list, parse_status_porcelain};
use mrgit::git::workspace::{MergeMode, merge_references};

// Sample git outputs for realistic benchmarking
const SMALL_STATUS: &str = "M  README.md\n M src/main.rs\n?? untracked.txt\n";

const MEDIUM_STATUS: &str = r#"M  Assets/Scenes/Main.unity
 M Assets/Scripts/Player.cs
MM Assets/Scripts/Enemy.cs
A  Assets/Scripts/Boss.cs
 D Assets/Old/Legacy.cs
R  Assets/Art/hero.png -> Assets/Art/Hero.png
?? Assets/Temp/notes.txt
?? "Assets/My Folder/file with spaces.cs"
M  Packages/manifest.json
 M ProjectSettings/ProjectSettings.asset
UU Assets/Scripts/Conflicted.cs
"#;

fn generate_large_status(num_files: usize) -> String {
    let mut output = String::new();
    for i in 0..num_files {
        output.push_str(&format!(" M Assets/Generated/file_{}.cs\n", i));
    }
    output
}

const BRANCH_LIST: &str = r#"* main
  feature-x
  bugfix-123
+ worktree-branch
  (HEAD detached at 1a2b3c4)
  remotes/origin/HEAD -> origin/main
  remotes/origin/main
  remotes/origin/feature-x
  remotes/fork/experiment"#;

const STASH_LIST: &str = r#"stash@{0}: WIP on main: 1a2b3c4 fix bug
stash@{1}: On feature-x: experimental feature
stash@{2}: On main: save progress"#;

const REMOTES: &str = "origin\thttps://example.com/game.git (fetch)\norigin\tgit@example.com:game.git (push)\nfork\thttps://example.com/fork.git (fetch)\nfork\thttps://example.com/fork.git (push)\n";

fn generate_branches(num_branches: usize) -> String {
    let mut output = String::from("* main\n");
    for i in 0..num_branches {
        output.push_str(&format!("  feature-{}\n  remotes/origin/feature-{}\n", i, i));
    }
    output
}

fn bench_parse_status(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_status_porcelain");

    group.bench_with_input(BenchmarkId::new("small", "3 files"), &SMALL_STATUS, |b, input| {
        b.iter(|| parse_status_porcelain(black_box(input)))
    });

    group.bench_with_input(BenchmarkId::new("medium", "11 files"), &MEDIUM_STATUS, |b, input| {
        b.iter(|| parse_status_porcelain(black_box(input)))
    });

    let large_status = generate_large_status(1000);
    group.bench_with_input(BenchmarkId::new("large", "1000 files"), &large_status, |b, input| {
        b.iter(|| parse_status_porcelain(black_box(input)))
    });

    group.finish();
}

fn bench_parse_references(c: &mut Criterion) {
    c.bench_function("parse_branches", |b| {
        b.iter(|| parse_branches(black_box(BRANCH_LIST)))
    });

    c.bench_function("parse_stash_list", |b| {
        b.iter(|| parse_stash_list(black_box(STASH_LIST)))
    });

    c.bench_function("parse_remotes", |b| b.iter(|| parse_remotes(black_box(REMOTES))));
}

fn bench_merge_references(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_references");

    let modules: Vec<_> = (0..8).map(|_| parse_branches(&generate_branches(50))).collect();
    let lists: Vec<&[_]> = modules.iter().map(Vec::as_slice).collect();

    group.bench_function("union 8x101", |b| {
        b.iter(|| merge_references(black_box(&lists), MergeMode::Union))
    });
    group.bench_function("intersection 8x101", |b| {
        b.iter(|| merge_references(black_box(&lists), MergeMode::Intersection))
    });

    group.finish();
}

fn bench_split_command_line(c: &mut Criterion) {
    c.bench_function("split_command_line", |b| {
        b.iter(|| {
            split_command_line(black_box(
                r#"add -f -- "Assets/My Folder/a b.cs" 'Assets/it''s.cs' Assets/plain.cs"#,
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_parse_status,
    bench_parse_references,
    bench_merge_references,
    bench_split_command_line
);
criterion_main!(benches);
