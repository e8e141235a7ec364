//! Android/Kivy companion project generated next to a packaged executable.
//!
//! Everything here is text generation; [`AndroidSkeleton::write`] is the only
//! function touching the filesystem.

use std::path::{Path, PathBuf};

/// A companion project for one uploaded Python file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidSkeleton {
    project_name: String,
}

impl AndroidSkeleton {
    /// Derive the project name from the uploaded file name: `.py` removed and
    /// every non-alphanumeric character dropped. The name must start with a
    /// letter to be usable as a Python class and Java package segment.
    pub fn for_file(file_name: &str) -> Self {
        let stem = file_name.strip_suffix(".py").unwrap_or(file_name);
        let name: String = stem.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let project_name = match name.chars().next() {
            None => "App".to_string(),
            Some(c) if c.is_ascii_digit() => format!("App{}", name),
            Some(_) => name,
        };
        Self { project_name }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Lower-cased name used in package identifiers.
    pub fn package_name(&self) -> String {
        self.project_name.to_lowercase()
    }

    /// Directories created even when they hold no files.
    pub fn directories(&self) -> Vec<PathBuf> {
        let main = Path::new("app").join("src").join("main");
        vec![
            main.join("java")
                .join("com")
                .join("example")
                .join(self.package_name()),
            main.join("res").join("values"),
            main.join("res").join("layout"),
            main.join("assets"),
        ]
    }

    /// Relative path and content of every generated file.
    pub fn files(&self) -> Vec<(PathBuf, String)> {
        let main = Path::new("app").join("src").join("main");
        vec![
            (PathBuf::from("buildozer.spec"), self.buildozer_spec()),
            (PathBuf::from("main.py"), self.kivy_main()),
            (Path::new("app").join("build.gradle"), self.build_gradle()),
            (main.join("AndroidManifest.xml"), self.manifest()),
            (
                main.join("res").join("values").join("strings.xml"),
                self.strings_xml(),
            ),
            (PathBuf::from("README.md"), self.readme()),
        ]
    }

    /// Write the project under `dir`.
    pub async fn write(&self, dir: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        for sub in self.directories() {
            tokio::fs::create_dir_all(dir.join(sub)).await?;
        }
        for (rel, content) in self.files() {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, content).await?;
        }
        Ok(())
    }

    fn buildozer_spec(&self) -> String {
        let name = &self.project_name;
        let pkg = self.package_name();
        format!(
            r#"[app]
title = {name}
package.name = {pkg}
package.domain = com.example

source.dir = .
source.include_exts = py,png,jpg,kv,atlas

version = 0.1
requirements = python3,kivy

fullscreen = 0
android.permissions = INTERNET
android.api = 30
android.minapi = 21
android.ndk = 25b

[buildozer]
log_level = 2
"#
        )
    }

    fn kivy_main(&self) -> String {
        let name = &self.project_name;
        format!(
            r#"from kivy.app import App
from kivy.uix.label import Label
from kivy.uix.boxlayout import BoxLayout
from kivy.uix.button import Button


class {name}App(App):
    def build(self):
        layout = BoxLayout(orientation='vertical')

        label = Label(text='Hello from {name}!',
                      size_hint=(1, 0.5))

        button = Button(text='Click me!',
                        size_hint=(1, 0.5))
        button.bind(on_press=self.on_button_click)

        layout.add_widget(label)
        layout.add_widget(button)

        return layout

    def on_button_click(self, instance):
        instance.text = 'Button clicked!'


if __name__ == '__main__':
    {name}App().run()
"#
        )
    }

    fn build_gradle(&self) -> String {
        let pkg = self.package_name();
        format!(
            r#"apply plugin: 'com.android.application'

android {{
    compileSdkVersion 30
    buildToolsVersion "30.0.3"

    defaultConfig {{
        applicationId "com.example.{pkg}"
        minSdkVersion 21
        targetSdkVersion 30
        versionCode 1
        versionName "1.0"
    }}

    buildTypes {{
        release {{
            minifyEnabled false
        }}
    }}
}}

dependencies {{
    implementation 'androidx.appcompat:appcompat:1.3.1'
}}
"#
        )
    }

    fn manifest(&self) -> String {
        let pkg = self.package_name();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.{pkg}">

    <uses-permission android:name="android.permission.INTERNET" />

    <application
        android:allowBackup="true"
        android:icon="@mipmap/ic_launcher"
        android:label="@string/app_name"
        android:theme="@style/AppTheme">

        <activity android:name=".MainActivity"
            android:exported="true">
            <intent-filter>
                <action android:name="android.intent.action.MAIN" />
                <category android:name="android.intent.category.LAUNCHER" />
            </intent-filter>
        </activity>
    </application>
</manifest>
"#
        )
    }

    fn strings_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name">{}</string>
</resources>
"#,
            self.project_name
        )
    }

    fn readme(&self) -> String {
        let name = &self.project_name;
        format!(
            r#"# {name} Android Project

Project layout for building {name} as an Android app with Python.

## Kivy / Buildozer

1. Install Buildozer: `pip install buildozer`
2. Install the Android SDK and NDK
3. Run: `buildozer android debug`

## Android Studio

1. Import this directory
2. Wire up a Python runtime such as Chaquopy
3. Build and run on a device or emulator

## Files

- `buildozer.spec`: Buildozer configuration
- `main.py`: sample Kivy application
- `app/`: Android project structure with `AndroidManifest.xml`
"#
        )
    }
}
