#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::fswatch::classify;
    use crate::model::FsClass;

    const HOME: &str = "/home/u/.akash-deploy";

    #[test]
    fn test_yaml_in_deployments_is_deployment_file() {
        let home = Path::new(HOME);
        assert_eq!(
            classify(home, &home.join("deployments/foo.yaml")),
            FsClass::DeploymentFile
        );
    }

    #[test]
    fn test_entry_in_home_is_config_file() {
        let home = Path::new(HOME);
        assert_eq!(classify(home, &home.join("config.yaml")), FsClass::ConfigFile);
    }

    #[test]
    fn test_other_files_are_unexpected() {
        let home = Path::new(HOME);
        assert_eq!(
            classify(home, &home.join("deployments/foo.txt")),
            FsClass::Unexpected
        );
        assert_eq!(
            classify(home, &home.join("deployments/nested/foo.yaml")),
            FsClass::Unexpected
        );
        assert_eq!(classify(home, Path::new("/etc/passwd")), FsClass::Unexpected);
        assert_eq!(classify(home, Path::new("/")), FsClass::Unexpected);
    }
}
