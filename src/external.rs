use crate::error::ShellError;
use log::debug;
use nix::unistd::{AccessFlags, access};
use std::path::{Path, PathBuf};

/// Resolve a program name to the executable that should be run for it.
///
/// Behavior:
/// - Each directory of `search_paths` is tried in order as `dir/program`; the
///   first candidate the current process may execute wins.
/// - Failing that, `program` itself is tried as a path, which covers absolute
///   and relative invocations such as `/bin/ls` or `./build.sh`.
/// - An empty name never resolves.
///
/// Only execute permission is checked, so a file that exists but is not
/// executable is reported the same way as a missing one.
pub fn resolve(program: &str, search_paths: &[String]) -> Result<PathBuf, ShellError> {
    if program.is_empty() {
        return Err(ShellError::CommandNotFound(String::new()));
    }

    if let Some(path) = find_in_path(search_paths, program) {
        debug!("resolved {program} to {} via search paths", path.display());
        return Ok(path);
    }

    if is_executable(Path::new(program)) {
        debug!("resolved {program} as a direct path");
        return Ok(PathBuf::from(program));
    }

    Err(ShellError::CommandNotFound(program.to_string()))
}

fn find_in_path(search_paths: &[String], program: &str) -> Option<PathBuf> {
    search_paths
        .iter()
        .map(|dir| PathBuf::from(format!("{dir}/{program}")))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "pipesh_external_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn touch(path: &Path, mode: u32) {
        fs::write(path, "#!/bin/sh\n").expect("write file");
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
    }

    fn dirs(paths: &[&Path]) -> Vec<String> {
        paths.iter().map(|p| p.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn first_match_wins() {
        let first = make_unique_temp_dir("first");
        let second = make_unique_temp_dir("second");
        touch(&first.join("tool"), 0o755);
        touch(&second.join("tool"), 0o755);

        let found = resolve("tool", &dirs(&[&first, &second])).unwrap();
        assert_eq!(found, first.join("tool"));

        let found = resolve("tool", &dirs(&[&second, &first])).unwrap();
        assert_eq!(found, second.join("tool"));

        let _ = fs::remove_dir_all(first);
        let _ = fs::remove_dir_all(second);
    }

    #[test]
    fn skips_candidates_without_execute_permission() {
        let plain = make_unique_temp_dir("plain");
        let exec = make_unique_temp_dir("exec");
        touch(&plain.join("tool"), 0o644);
        touch(&exec.join("tool"), 0o755);

        let found = resolve("tool", &dirs(&[&plain, &exec])).unwrap();
        assert_eq!(found, exec.join("tool"));

        let _ = fs::remove_dir_all(plain);
        let _ = fs::remove_dir_all(exec);
    }

    #[test]
    fn single_component_found_in_bin() {
        let found = resolve("sh", &["/bin".to_string(), "/usr/bin".to_string()])
            .expect("Expected to find 'sh' in /bin or /usr/bin");
        assert!(found.ends_with("sh"), "unexpected path {:?}", found);
    }

    #[test]
    fn absolute_path_is_used_directly() {
        let found = resolve("/bin/sh", &[]).expect("Expected /bin/sh to be executable");
        assert_eq!(found, PathBuf::from("/bin/sh"));
    }

    #[test]
    fn absolute_nonexisting() {
        assert_eq!(
            resolve("/does/not/exist", &["/bin".to_string()]),
            Err(ShellError::CommandNotFound("/does/not/exist".to_string()))
        );
    }

    #[test]
    fn empty_search_paths_fail_for_bare_names() {
        assert!(resolve("sh", &["/bin".to_string()]).is_ok());
        assert_eq!(
            resolve("sh", &[]),
            Err(ShellError::CommandNotFound("sh".to_string()))
        );
    }

    #[test]
    fn empty_name_is_never_found() {
        assert!(resolve("", &["/bin".to_string()]).is_err());
    }
}
