mod common;

use std::collections::HashSet;

use proptest::prelude::*;
use regex::Regex;
use tempfile::TempDir;
use watchbuild::dag::DependencyGraph;

use common::write_file;

// Strategy: a random acyclic reference layout. File i may only reference
// files 0..i, so cycles are impossible by construction.
fn acyclic_layout(max_files: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2..=max_files).prop_flat_map(|num_files| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_files),
            num_files,
        )
        .prop_map(move |raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let mut refs = HashSet::new();
                    for r in potential {
                        if i > 0 {
                            refs.insert(r % i);
                        }
                    }
                    let mut refs: Vec<usize> = refs.into_iter().collect();
                    refs.sort();
                    refs
                })
                .collect()
        })
    })
}

proptest! {
    #[test]
    #[ignore]
    fn every_file_resolves_to_parentless_roots(layout in acyclic_layout(12)) {
        let src = TempDir::new().unwrap();
        for (i, refs) in layout.iter().enumerate() {
            let mut contents = String::new();
            for r in refs {
                contents.push_str(&format!("// require f{r}.txt\n"));
            }
            contents.push_str("payload\n");
            write_file(src.path(), &format!("f{i}.txt"), &contents);
        }

        let mut graph = DependencyGraph::new(Regex::new(r"^//\s*require\s+(\S+)").unwrap());
        for i in 0..layout.len() {
            graph.resolve(src.path(), &format!("f{i}.txt")).unwrap();
        }

        // f0 never references anything, so it is always a root.
        prop_assert!(graph.is_root("f0.txt"));

        for (i, refs) in layout.iter().enumerate() {
            let rel = format!("f{i}.txt");
            prop_assert_eq!(graph.is_root(&rel), refs.is_empty());

            let roots = graph.roots_for(&rel);
            // Acyclic and fully resolved: every chain ends in a root.
            prop_assert!(!roots.is_empty());

            let own_mtime = std::fs::metadata(src.path().join(&rel))
                .and_then(|m| m.modified())
                .unwrap();
            for root in &roots {
                prop_assert!(graph.is_root(&root.rel));
                // The carried timestamp can only grow along the chain.
                prop_assert!(root.required >= own_mtime);
            }

            if refs.is_empty() {
                prop_assert_eq!(roots.len(), 1);
                prop_assert_eq!(roots[0].rel.as_str(), rel.as_str());
            }
        }
    }
}
