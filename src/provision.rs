//! 运行环境准备：conda 环境、venv 虚拟环境或直接沿用当前环境

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use strip_ansi_escapes::strip;

use crate::error::{LaunchError, Result};

/// 激活成功后子进程应使用的环境
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    pub env_name: String,
    pub prefix: Option<PathBuf>,
    /// 需要加到 PATH 最前面的目录，按优先级排列
    pub path_prepend: Vec<PathBuf>,
    pub vars: Vec<(String, OsString)>,
}

impl Activation {
    /// 不做任何修改，沿用当前进程环境
    pub fn inherited(name: &str) -> Self {
        Activation {
            env_name: name.to_string(),
            ..Default::default()
        }
    }

    /// 拼接新的 PATH，无需修改时返回 None
    pub fn path_value(&self, current: Option<OsString>) -> Result<Option<OsString>> {
        if self.path_prepend.is_empty() {
            return Ok(None);
        }
        let mut dirs = self.path_prepend.clone();
        if let Some(current) = current {
            dirs.extend(env::split_paths(&current));
        }
        let joined = env::join_paths(dirs)
            .map_err(|e| LaunchError::activation(&self.env_name, format!("PATH 拼接失败: {}", e)))?;
        Ok(Some(joined))
    }

    /// 在环境目录中查找解释器，找不到时原样返回交给系统 PATH 解析
    pub fn resolve_program(&self, program: &str) -> PathBuf {
        for dir in &self.path_prepend {
            for candidate in program_candidates(program) {
                let path = dir.join(&candidate);
                if path.is_file() {
                    return path;
                }
            }
        }
        PathBuf::from(program)
    }
}

fn program_candidates(program: &str) -> Vec<String> {
    if cfg!(windows) && Path::new(program).extension().is_none() {
        vec![format!("{}.exe", program), program.to_string()]
    } else {
        vec![program.to_string()]
    }
}

/// 环境准备策略。激活失败时调用方不得启动子进程。
pub trait EnvironmentProvisioner {
    fn activate(&self, name: &str) -> Result<Activation>;

    /// 用于错误提示中的环境管理器名称
    fn manager(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerKind {
    Conda,
    Venv,
    None,
}

pub struct CondaProvisioner {
    program: String,
}

#[derive(Debug, Deserialize)]
struct CondaEnvList {
    envs: Vec<PathBuf>,
}

impl CondaProvisioner {
    /// 配置仍为默认的 `conda` 时优先使用 conda 初始化后设置的 CONDA_EXE
    pub fn new(program: &str) -> Self {
        let program = match env::var("CONDA_EXE") {
            Ok(exe) if program == "conda" && !exe.trim().is_empty() => exe,
            _ => program.to_string(),
        };
        CondaProvisioner { program }
    }

    fn env_list(&self, name: &str) -> Result<String> {
        log::info!("执行 {} env list --json", self.program);
        let output = Command::new(&self.program)
            .args(["env", "list", "--json"])
            .output()
            .map_err(|e| LaunchError::activation(name, format!("无法执行 {}: {}", self.program, e)))?;

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            let cleaned = String::from_utf8_lossy(&strip(line)).into_owned();
            if !cleaned.trim().is_empty() {
                log::warn!("CONDA STDERR: {}", cleaned);
            }
        }

        if !output.status.success() {
            return Err(LaunchError::activation(
                name,
                format!("{} 返回非零状态: {}", self.program, output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl EnvironmentProvisioner for CondaProvisioner {
    fn activate(&self, name: &str) -> Result<Activation> {
        let listing = self.env_list(name)?;
        let prefix = find_env_prefix(&listing, name)
            .map_err(|e| LaunchError::activation(name, format!("无法解析环境列表: {}", e)))?
            .ok_or_else(|| LaunchError::activation(name, "环境不存在"))?;
        log::info!("找到 conda 环境 {}: {:?}", name, prefix);

        let prefix_value = prefix.clone().into_os_string();
        Ok(Activation {
            env_name: name.to_string(),
            path_prepend: conda_path_entries(&prefix, cfg!(windows)),
            vars: vec![
                ("CONDA_PREFIX".to_string(), prefix_value),
                ("CONDA_DEFAULT_ENV".to_string(), OsString::from(name)),
            ],
            prefix: Some(prefix),
        })
    }

    fn manager(&self) -> &str {
        "conda"
    }
}

/// 从 `conda env list --json` 的输出中找出名为 `name` 的环境目录
pub fn find_env_prefix(listing: &str, name: &str) -> serde_json::Result<Option<PathBuf>> {
    let list: CondaEnvList = serde_json::from_str(listing)?;
    let found = list.envs.into_iter().find(|prefix| {
        if name == "base" {
            !is_named_env(prefix)
        } else {
            is_named_env(prefix) && prefix.file_name().is_some_and(|n| n == name)
        }
    });
    Ok(found)
}

// 具名环境位于某个 envs 目录下，根环境不是
fn is_named_env(prefix: &Path) -> bool {
    prefix
        .parent()
        .and_then(|p| p.file_name())
        .is_some_and(|n| n == "envs")
}

/// conda 激活时加入 PATH 的目录
pub fn conda_path_entries(prefix: &Path, windows: bool) -> Vec<PathBuf> {
    if windows {
        vec![
            prefix.to_path_buf(),
            prefix.join("Library").join("mingw-w64").join("bin"),
            prefix.join("Library").join("usr").join("bin"),
            prefix.join("Library").join("bin"),
            prefix.join("Scripts"),
            prefix.join("bin"),
        ]
    } else {
        vec![prefix.join("bin")]
    }
}

/// 以目录形式给出的 Python 虚拟环境
pub struct VenvProvisioner {
    base_dir: PathBuf,
}

impl VenvProvisioner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        VenvProvisioner { base_dir: base_dir.into() }
    }
}

impl EnvironmentProvisioner for VenvProvisioner {
    fn activate(&self, name: &str) -> Result<Activation> {
        let root = self.base_dir.join(name);
        if !root.join("pyvenv.cfg").is_file() {
            return Err(LaunchError::activation(
                name,
                format!("{:?} 不是有效的虚拟环境 (缺少 pyvenv.cfg)", root),
            ));
        }
        log::info!("找到虚拟环境: {:?}", root);

        let bin = if cfg!(windows) { root.join("Scripts") } else { root.join("bin") };
        Ok(Activation {
            env_name: name.to_string(),
            path_prepend: vec![bin],
            vars: vec![("VIRTUAL_ENV".to_string(), root.clone().into_os_string())],
            prefix: Some(root),
        })
    }

    fn manager(&self) -> &str {
        "venv"
    }
}

pub struct NoopProvisioner;

impl EnvironmentProvisioner for NoopProvisioner {
    fn activate(&self, name: &str) -> Result<Activation> {
        log::info!("跳过环境激活，沿用当前环境");
        Ok(Activation::inherited(name))
    }

    fn manager(&self) -> &str {
        "Python"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LISTING: &str = r#"{
      "envs": [
        "/opt/conda",
        "/opt/conda/envs/illuTag_env",
        "/opt/conda/envs/other",
        "/home/u/projects/illuTag_env"
      ]
    }"#;

    #[test]
    fn finds_named_env_under_envs_dir() {
        let prefix = find_env_prefix(LISTING, "illuTag_env").unwrap();
        assert_eq!(prefix, Some(PathBuf::from("/opt/conda/envs/illuTag_env")));
    }

    #[test]
    fn base_resolves_to_root_prefix() {
        let prefix = find_env_prefix(LISTING, "base").unwrap();
        assert_eq!(prefix, Some(PathBuf::from("/opt/conda")));
    }

    #[test]
    fn unknown_env_is_none() {
        assert_eq!(find_env_prefix(LISTING, "missing").unwrap(), None);
    }

    #[test]
    fn garbage_listing_is_an_error() {
        assert!(find_env_prefix("Traceback (most recent call last)", "x").is_err());
    }

    #[test]
    fn windows_path_entries_include_scripts_and_library() {
        let entries = conda_path_entries(Path::new("C:/conda/envs/e"), true);
        assert_eq!(entries[0], PathBuf::from("C:/conda/envs/e"));
        assert!(entries.contains(&PathBuf::from("C:/conda/envs/e").join("Scripts")));
        assert!(entries.contains(&PathBuf::from("C:/conda/envs/e").join("Library").join("bin")));
    }

    #[test]
    fn unix_path_entries_are_bin_only() {
        let entries = conda_path_entries(Path::new("/opt/conda/envs/e"), false);
        assert_eq!(entries, vec![PathBuf::from("/opt/conda/envs/e/bin")]);
    }

    #[test]
    fn missing_conda_binary_fails_activation() {
        let conda = CondaProvisioner {
            program: "definitely-not-conda-4f2a".to_string(),
        };
        let err = conda.activate("illuTag_env").unwrap_err();
        assert!(matches!(err, LaunchError::ActivationFailed { .. }));
    }

    /// 写一个可执行的假 conda 脚本
    #[cfg(unix)]
    fn fake_conda(dir: &Path, body: &str) -> CondaProvisioner {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("conda");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        CondaProvisioner { program: path.display().to_string() }
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_conda_status_fails_activation() {
        let dir = tempfile::tempdir().unwrap();
        let conda = fake_conda(dir.path(), "echo 'CondaError: broken' >&2\nexit 1");
        match conda.activate("illuTag_env") {
            Err(LaunchError::ActivationFailed { name, reason }) => {
                assert_eq!(name, "illuTag_env");
                assert!(reason.contains("非零状态"), "reason: {}", reason);
            }
            other => panic!("expected activation failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn env_missing_from_listing_fails_activation() {
        let dir = tempfile::tempdir().unwrap();
        let conda = fake_conda(
            dir.path(),
            r#"echo '{"envs": ["/opt/conda", "/opt/conda/envs/other"]}'"#,
        );
        match conda.activate("illuTag_env") {
            Err(LaunchError::ActivationFailed { reason, .. }) => assert_eq!(reason, "环境不存在"),
            other => panic!("expected activation failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn listed_env_activates_with_conda_vars() {
        let dir = tempfile::tempdir().unwrap();
        let conda = fake_conda(
            dir.path(),
            r#"echo '{"envs": ["/opt/conda", "/opt/conda/envs/illuTag_env"]}'"#,
        );
        let activation = conda.activate("illuTag_env").unwrap();
        assert_eq!(activation.prefix, Some(PathBuf::from("/opt/conda/envs/illuTag_env")));
        assert_eq!(activation.path_prepend, vec![PathBuf::from("/opt/conda/envs/illuTag_env/bin")]);
        assert!(activation.vars.iter().any(|(k, v)| k == "CONDA_DEFAULT_ENV" && v == "illuTag_env"));
    }

    #[test]
    fn conda_exe_is_preferred_only_for_default_program() {
        env::set_var("CONDA_EXE", "/opt/conda/bin/conda");
        assert_eq!(CondaProvisioner::new("conda").program, "/opt/conda/bin/conda");
        assert_eq!(CondaProvisioner::new("/custom/conda").program, "/custom/conda");

        env::set_var("CONDA_EXE", "  ");
        assert_eq!(CondaProvisioner::new("conda").program, "conda");

        env::remove_var("CONDA_EXE");
        assert_eq!(CondaProvisioner::new("conda").program, "conda");
    }

    #[test]
    fn venv_requires_pyvenv_cfg() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("illuTag_env")).unwrap();
        let venv = VenvProvisioner::new(dir.path());
        assert!(venv.activate("illuTag_env").is_err());

        fs::write(dir.path().join("illuTag_env").join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();
        let activation = venv.activate("illuTag_env").unwrap();
        assert_eq!(activation.prefix, Some(dir.path().join("illuTag_env")));
        assert_eq!(activation.vars[0].0, "VIRTUAL_ENV");
        assert_eq!(activation.path_prepend.len(), 1);
    }

    #[test]
    fn path_value_prepends_environment_dirs() {
        let activation = Activation {
            env_name: "e".into(),
            path_prepend: vec![PathBuf::from("/env/bin")],
            ..Default::default()
        };
        let current = env::join_paths([PathBuf::from("/usr/bin")]).unwrap();
        let joined = activation.path_value(Some(current)).unwrap().unwrap();
        let dirs: Vec<PathBuf> = env::split_paths(&joined).collect();
        assert_eq!(dirs, vec![PathBuf::from("/env/bin"), PathBuf::from("/usr/bin")]);
    }

    #[test]
    fn inherited_activation_leaves_path_alone() {
        let activation = NoopProvisioner.activate("illuTag_env").unwrap();
        assert_eq!(activation.path_value(env::var_os("PATH")).unwrap(), None);
        assert_eq!(activation.resolve_program("python"), PathBuf::from("python"));
    }

    #[test]
    fn resolve_program_prefers_environment_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let name = if cfg!(windows) { "python.exe" } else { "python" };
        fs::write(dir.path().join(name), b"").unwrap();
        let activation = Activation {
            env_name: "e".into(),
            path_prepend: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert_eq!(activation.resolve_program("python"), dir.path().join(name));
    }
}
